//! Claimant notification seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// Template parameters for a notification, keyed by template field name
pub type TemplateParams = BTreeMap<String, String>;

/// Errors from the notification channel
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notification service rejected or dropped the send.
    #[error("Notification send failed: {0}")]
    SendFailed(String),

    /// No notification address is known for the claimant.
    #[error("No notification address for claimant")]
    NoAddress,
}

/// Sends claimant-facing notifications.
///
/// Notifications are advisory: a send failure is logged and never changes
/// a record's state or fails an attempt.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Notify the claimant that their submission was accepted
    ///
    /// # Errors
    /// Returns an error if the send fails; callers log and move on.
    async fn send_success(
        &self,
        address: &str,
        params: &TemplateParams,
    ) -> Result<(), NotifyError>;

    /// Notify the claimant that automated submission failed and a backup
    /// intake path applies
    ///
    /// # Errors
    /// Returns an error if the send fails; callers log and move on.
    async fn send_failure(
        &self,
        address: &str,
        params: &TemplateParams,
    ) -> Result<(), NotifyError>;
}

//! Exhaustion handling: identity fallback or final failure.
//!
//! When an attempt-series ends without success, the processor emits an
//! [`ExhaustionNotice`] and the [`ExhaustionHandler`] decides what happens
//! next: rotate the record to an untried identity and start a fresh
//! series, or mark it failed when no identities remain. The decision
//! always works from a freshly loaded record, so a stale notice (e.g. one
//! delivered after an operator intervened) cannot resurrect a settled
//! record.

use std::sync::Arc;

use docket_common::{
    claimant::ClaimantProfile,
    internal,
    record::{AttemptError, ErrorKind, SubmissionId, SubmissionRecord, SubmissionState},
};
use docket_ledger::RecordStore;
use tracing::warn;

use crate::{
    error::{SubmitError, SystemError},
    notify::Notifier,
    pool::IdentifierPool,
    tracker::JobStatusTracker,
};

/// The message a finished attempt-series sends to the fallback decision.
///
/// Carries everything the decision needs, so the handler never has to
/// reconstruct context from the attempt that produced it.
#[derive(Debug, Clone)]
pub struct ExhaustionNotice {
    pub submission_id: SubmissionId,
    /// The classified error that ended the series
    pub last_error: AttemptError,
    /// Attempts made under the exhausted identity
    pub attempts: u32,
    /// Claimant data for the failure notification, when preparation got
    /// far enough to produce it
    pub claimant: Option<ClaimantProfile>,
}

/// Outcome of handling an exhaustion notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Rotated to a fresh identity; a new attempt-series is pending
    Rotated,
    /// No identities left; the record is failed
    Failed,
    /// The record had already settled; nothing was done
    AlreadySettled,
}

/// Decides between identity fallback and final failure.
#[derive(Debug)]
pub struct ExhaustionHandler {
    ledger: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    /// Upstream name, for metrics attribution
    upstream: String,
    /// Whether to send the backup-intake notification on final failure
    /// caused by the busy condition
    backup_notification: bool,
}

impl ExhaustionHandler {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        upstream: String,
        backup_notification: bool,
    ) -> Self {
        Self {
            ledger,
            notifier,
            upstream,
            backup_notification,
        }
    }

    /// Handle an exhaustion notice
    ///
    /// Reloads the record, retires the exhausted identity, and either
    /// rotates to the next untried candidate or fails the record.
    /// Idempotent: a notice for an already-settled record is a no-op.
    ///
    /// # Errors
    /// Returns a system error if the ledger cannot be read or written.
    /// Notification failures are logged, never raised.
    pub async fn handle(
        &self,
        notice: &ExhaustionNotice,
    ) -> Result<(SubmissionRecord, FallbackOutcome), SubmitError> {
        let mut record = self.ledger.load(&notice.submission_id).await?;

        // Only a record awaiting the fallback decision is acted on. A
        // terminal record (operator intervention, duplicate notice) and a
        // record already re-enqueued under a new identity both stay as
        // they are.
        if !matches!(
            record.state(),
            SubmissionState::InFlight | SubmissionState::ExhaustedPendingFallback
        ) {
            internal!(
                level = DEBUG,
                "Exhaustion notice for settled record {} ({}), ignoring",
                record.id(),
                record.state()
            );
            return Ok((record, FallbackOutcome::AlreadySettled));
        }

        let retired = record.active_identity().as_str().to_string();
        record.mark_active_identity_tried();

        if let Some(next) = IdentifierPool::next_untried(&record) {
            record
                .rotate_identity(next)
                .map_err(|e| SystemError::Internal(e.to_string()))?;
            self.ledger.update(&mut record).await?;

            JobStatusTracker::on_fallback(&record, &retired);

            Ok((record, FallbackOutcome::Rotated))
        } else {
            record
                .fail(notice.last_error.to_string())
                .map_err(|e| SystemError::Internal(e.to_string()))?;
            self.ledger.update(&mut record).await?;

            JobStatusTracker::on_final_failure(&record, &self.upstream);

            if self.backup_notification && notice.last_error.kind == ErrorKind::UpstreamBusy {
                self.send_backup_notification(&record, notice).await;
            }

            Ok((record, FallbackOutcome::Failed))
        }
    }

    /// Tell the claimant their submission moved to the backup intake path
    ///
    /// Send failures are logged and swallowed: the record is already
    /// failed, and the notification must not change that outcome.
    async fn send_backup_notification(&self, record: &SubmissionRecord, notice: &ExhaustionNotice) {
        let Some(claimant) = &notice.claimant else {
            warn!(
                submission_id = %record.id(),
                "Cannot send backup-intake notification: no claimant data on notice"
            );
            return;
        };

        let Some(address) = &claimant.notify_email else {
            warn!(
                submission_id = %record.id(),
                "Cannot send backup-intake notification: claimant has no notification address"
            );
            return;
        };

        if let Err(e) = self
            .notifier
            .send_failure(address, &claimant.template_params())
            .await
        {
            warn!(
                submission_id = %record.id(),
                error = %e,
                "Failed to send backup-intake notification"
            );
        }
    }
}

//! Claimant value objects
//!
//! Upstream submission and notification both need a small slice of
//! claimant data. Rather than threading the raw claim everywhere, the
//! orchestrator derives a [`ClaimantProfile`] once, up front, with a pure
//! mapping function. Every field the rest of the pipeline may touch is
//! declared here; there is no dynamic field access downstream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Raw claim data as captured at intake
///
/// This is the claim-side view: whatever the form flow collected about the
/// claimant, plus the encoded form body itself. The orchestrator never
/// reads these fields directly after intake; it works from the derived
/// [`ClaimantProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDetails {
    /// Form type identifier, e.g. `21-526EZ`
    pub form_id: String,
    /// Claimant name as entered on the form
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    /// Contact email from the form
    pub email: Option<String>,
    /// Preferred notification address from the claimant's profile, when it
    /// differs from the form contact email
    pub profile_email: Option<String>,
    /// Stable external identifier for the claimant (account UUID)
    pub external_uuid: Option<String>,
    /// Encoded form body, opaque to the orchestrator
    pub body: Vec<u8>,
}

/// The claimant fields the submission pipeline actually uses
///
/// Derived from [`ClaimDetails`] by [`ClaimantProfile::from_claim`]; all
/// optional fields stay optional so missing data surfaces as `None`
/// instead of an empty-string sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimantProfile {
    pub first_name: String,
    pub last_name: Option<String>,
    /// Form contact email
    pub email: Option<String>,
    /// Address notifications go to; the profile email wins over the form
    /// contact email when both are present
    pub notify_email: Option<String>,
    pub external_uuid: Option<String>,
}

impl ClaimantProfile {
    /// Derive a profile from raw claim data
    ///
    /// Pure: same claim in, same profile out. Notification address
    /// preference order is profile email, then form contact email.
    #[must_use]
    pub fn from_claim(claim: &ClaimDetails) -> Self {
        let notify_email = claim
            .profile_email
            .clone()
            .or_else(|| claim.email.clone());

        Self {
            first_name: claim.first_name.clone(),
            last_name: claim.last_name.clone(),
            email: claim.email.clone(),
            notify_email,
            external_uuid: claim.external_uuid.clone(),
        }
    }

    /// Template parameters for claimant-facing notifications
    ///
    /// Only fields that are present appear in the map; templates handle
    /// absent keys themselves.
    #[must_use]
    pub fn template_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("first_name".to_string(), self.first_name.clone());
        if let Some(last_name) = &self.last_name {
            params.insert("last_name".to_string(), last_name.clone());
        }
        if let Some(email) = &self.email {
            params.insert("email".to_string(), email.clone());
        }
        params
    }
}

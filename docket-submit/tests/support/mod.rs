//! Test doubles for submission scenarios
//!
//! This module provides:
//! - A scripted upstream backend that replays a fixed sequence of
//!   responses and records every call it receives
//! - A recording notifier for asserting on claimant notifications
//! - Preparation services that always succeed or always fail
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use docket_common::{
    claimant::ClaimantProfile,
    record::{ClaimReference, IdentityKey, UpstreamClaimId},
};
use docket_submit::{
    Notifier, NotifyError, PreparationService, SubmissionPayload, TemplateParams, UpstreamError,
    UpstreamResponse, UpstreamSubmitter,
};

/// Upstream backend that replays a scripted sequence of responses
///
/// Responses are consumed in order, one per `submit` call. When the
/// script runs out, further calls succeed with a generated claim id.
/// Every call is counted and the identity it was made under is recorded.
#[derive(Debug)]
pub struct ScriptedUpstream {
    name: String,
    script: Mutex<VecDeque<Result<UpstreamResponse, UpstreamError>>>,
    calls: AtomicUsize,
    identities_seen: Mutex<Vec<String>>,
}

impl ScriptedUpstream {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            identities_seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response carrying the given upstream claim id
    pub fn push_ok(&self, claim_id: &str) {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Ok(UpstreamResponse {
                upstream_claim_id: UpstreamClaimId::new(claim_id),
            }));
    }

    /// Queue a failure response
    pub fn push_err(&self, error: UpstreamError) {
        self.script.lock().expect("script lock").push_back(Err(error));
    }

    /// Queue the same failure `count` times
    pub fn push_err_repeated(&self, count: usize, make: impl Fn() -> UpstreamError) {
        for _ in 0..count {
            self.push_err(make());
        }
    }

    /// Total number of `submit` calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identity keys in the order calls were made under them
    pub fn identities_seen(&self) -> Vec<String> {
        self.identities_seen.lock().expect("identities lock").clone()
    }
}

#[async_trait]
impl UpstreamSubmitter for ScriptedUpstream {
    async fn submit(
        &self,
        identity: &IdentityKey,
        _payload: &SubmissionPayload,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identities_seen
            .lock()
            .expect("identities lock")
            .push(identity.as_str().to_string());

        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(UpstreamResponse {
                    upstream_claim_id: UpstreamClaimId::new("600999999"),
                })
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Notifier that records every send instead of delivering anything
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub successes: Mutex<Vec<(String, TemplateParams)>>,
    pub failures: Mutex<Vec<(String, TemplateParams)>>,
}

impl RecordingNotifier {
    pub fn success_count(&self) -> usize {
        self.successes.lock().expect("successes lock").len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().expect("failures lock").len()
    }

    pub fn success_addresses(&self) -> Vec<String> {
        self.successes
            .lock()
            .expect("successes lock")
            .iter()
            .map(|(address, _)| address.clone())
            .collect()
    }

    pub fn failure_addresses(&self) -> Vec<String> {
        self.failures
            .lock()
            .expect("failures lock")
            .iter()
            .map(|(address, _)| address.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_success(
        &self,
        address: &str,
        params: &TemplateParams,
    ) -> Result<(), NotifyError> {
        self.successes
            .lock()
            .expect("successes lock")
            .push((address.to_string(), params.clone()));
        Ok(())
    }

    async fn send_failure(
        &self,
        address: &str,
        params: &TemplateParams,
    ) -> Result<(), NotifyError> {
        self.failures
            .lock()
            .expect("failures lock")
            .push((address.to_string(), params.clone()));
        Ok(())
    }
}

/// Test claimant with a notification address
pub fn claimant() -> ClaimantProfile {
    ClaimantProfile {
        first_name: "Mara".to_string(),
        last_name: Some("Whitfield".to_string()),
        email: Some("mara@example.com".to_string()),
        notify_email: Some("mara.notify@example.com".to_string()),
        external_uuid: Some("6c02d95e-f26a-4c6e-b6a7-8b3f6e1a9f00".to_string()),
    }
}

/// Preparation service that always produces the same payload
#[derive(Debug)]
pub struct StaticPreparer {
    pub claimant: ClaimantProfile,
}

impl StaticPreparer {
    pub fn new() -> Self {
        Self {
            claimant: claimant(),
        }
    }
}

#[async_trait]
impl PreparationService for StaticPreparer {
    async fn prepare(
        &self,
        _claim_ref: &ClaimReference,
    ) -> Result<SubmissionPayload, UpstreamError> {
        Ok(SubmissionPayload {
            form_id: "21-526EZ".to_string(),
            claimant: self.claimant.clone(),
            body: b"{}".to_vec(),
        })
    }
}

/// Preparation service that always fails with a permanent rejection
#[derive(Debug)]
pub struct FailingPreparer;

#[async_trait]
impl PreparationService for FailingPreparer {
    async fn prepare(
        &self,
        _claim_ref: &ClaimReference,
    ) -> Result<SubmissionPayload, UpstreamError> {
        Err(UpstreamError::Rejected(
            "claim body failed schema validation".to_string(),
        ))
    }
}

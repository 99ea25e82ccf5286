//! Submission record types.
//!
//! A [`SubmissionRecord`] is the durable state of one logical claim
//! submission: the identity key currently in use, the ordered set of
//! candidate identities still eligible for fallback, the full attempt
//! history, and the lifecycle state. Records are never deleted; they are
//! the audit trail an operator consults to answer "did this claim make it".

use std::fmt::{self, Display, Formatter};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier for a submission record
///
/// This is a globally unique identifier (ULID) that serves as both the
/// tracking ID and the filename for file-backed ledgers. ULIDs are
/// lexicographically sortable by creation time and collision-resistant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId {
    id: ulid::Ulid,
}

impl SubmissionId {
    /// Create a submission ID from an existing ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique submission ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Parse a submission ID from a ledger filename like `01ARYZ6S41.rec`
    ///
    /// Validates that the filename is a valid ULID to prevent path
    /// traversal when listing a file-backed ledger directory.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(".rec")?;
        let id = ulid::Ulid::from_string(stem).ok()?;

        Some(Self { id })
    }

    /// The filename this record is stored under in a file-backed ledger
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.rec", self.id)
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }
}

impl Display for SubmissionId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.id)
    }
}

/// An identity key under which a claim can be submitted upstream
///
/// Claims can carry several identity keys (e.g. alternate person record
/// numbers known to the upstream service). The orchestrator submits under
/// one at a time and rotates to the next untried key when the current one
/// is permanently rejected. Identity keys are PII; audit logging redacts
/// them (see [`crate::audit`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl Display for IdentityKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Opaque pointer to the external claim/form entity this submission is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReference(String);

impl ClaimReference {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClaimReference {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Claim identifier assigned by the upstream service on successful intake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamClaimId(String);

impl UpstreamClaimId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UpstreamClaimId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// Classified failure kind, assigned once per attempt at the catch boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Upstream outage, gateway timeout, declared unavailability.
    /// Retryable under the same identity, against the retry budget.
    Transient,
    /// The upstream reported its shared processing slot for this identity
    /// as already claimed. Never resolved by retrying the same identity;
    /// eligible for identity fallback.
    UpstreamBusy,
    /// The upstream explicitly rejected the payload for this identity.
    /// Eligible for identity fallback.
    PermanentReject,
    /// Anything the classifier could not place. Routed like
    /// [`ErrorKind::PermanentReject`] so an unclassified failure can never
    /// loop silently.
    Unknown,
}

impl ErrorKind {
    /// Whether this kind is resolved by retrying under the same identity
    #[must_use]
    pub const fn retries_same_identity(self) -> bool {
        matches!(self, Self::Transient)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::UpstreamBusy => "upstream_busy",
            Self::PermanentReject => "permanent_reject",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.label())
    }
}

/// The last classified error observed for a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl Display for AttemptError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: {}", self.kind, self.message)
    }
}

/// One entry in a record's attempt history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAttempt {
    pub timestamp: SystemTime,
    /// Identity key the attempt was made under
    pub identity: IdentityKey,
    /// `None` for the successful attempt
    pub error: Option<AttemptError>,
}

/// Lifecycle state of a submission record
///
/// Transitions are forward-only:
/// `Pending → InFlight → {Delivered | ExhaustedPendingFallback | Failed}`,
/// and `ExhaustedPendingFallback → Pending` (fresh series under a new
/// identity) or `→ Failed` (no identities left). `Delivered` and `Failed`
/// are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    /// Waiting for the scheduler to dispatch an attempt
    Pending,
    /// An attempt is currently executing
    InFlight,
    /// The upstream accepted the submission; `upstream_claim_id` is set
    Delivered,
    /// The current identity's options are spent; awaiting the fallback
    /// decision (rotate or fail)
    ExhaustedPendingFallback,
    /// All automated options are exhausted; the payload is the final error
    Failed(String),
}

impl SubmissionState {
    /// Whether no further transitions are permitted
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed(_))
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Delivered => "delivered",
            Self::ExhaustedPendingFallback => "exhausted_pending_fallback",
            Self::Failed(_) => "failed",
        }
    }
}

impl Display for SubmissionState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.label())
    }
}

/// Errors raised by record constructors and guarded mutators
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// A record must carry at least one candidate identity.
    #[error("submission record requires at least one candidate identity")]
    NoCandidateIdentities,

    /// The requested identity is not an untried candidate.
    #[error("identity {0} is not an untried candidate for this record")]
    IdentityNotEligible(IdentityKey),

    /// The record is in a terminal state and may not change.
    #[error("record is terminal ({0}); no further transitions permitted")]
    Terminal(&'static str),
}

/// Durable state of one logical claim submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    id: SubmissionId,
    claim_ref: ClaimReference,
    /// Ordered, append-only set of identity keys eligible for submission
    candidate_identities: Vec<IdentityKey>,
    /// Candidates already spent, in the order they were exhausted
    tried_identities: Vec<IdentityKey>,
    /// The identity the current attempt-series runs under
    active_identity: IdentityKey,
    state: SubmissionState,
    /// Attempts made under the current identity; reset on rotation
    attempt_count: u32,
    last_error: Option<AttemptError>,
    upstream_claim_id: Option<UpstreamClaimId>,
    /// Full per-attempt history across every identity (audit data)
    attempts: Vec<SubmissionAttempt>,
    queued_at: SystemTime,
    /// Earliest time the scheduler may dispatch the next attempt
    next_attempt_at: Option<SystemTime>,
    /// Optimistic-concurrency stamp, bumped by the ledger on every update
    version: u64,
}

impl SubmissionRecord {
    /// Create a new pending record for a claim
    ///
    /// The first candidate identity becomes the active one.
    ///
    /// # Errors
    /// Returns [`RecordError::NoCandidateIdentities`] if `candidates` is
    /// empty.
    pub fn new(
        claim_ref: ClaimReference,
        candidates: Vec<IdentityKey>,
    ) -> Result<Self, RecordError> {
        let active_identity = candidates
            .first()
            .cloned()
            .ok_or(RecordError::NoCandidateIdentities)?;

        Ok(Self {
            id: SubmissionId::generate(),
            claim_ref,
            candidate_identities: candidates,
            tried_identities: Vec::new(),
            active_identity,
            state: SubmissionState::Pending,
            attempt_count: 0,
            last_error: None,
            upstream_claim_id: None,
            attempts: Vec::new(),
            queued_at: SystemTime::now(),
            next_attempt_at: None,
            version: 0,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &SubmissionId {
        &self.id
    }

    #[must_use]
    pub const fn claim_ref(&self) -> &ClaimReference {
        &self.claim_ref
    }

    #[must_use]
    pub fn candidate_identities(&self) -> &[IdentityKey] {
        &self.candidate_identities
    }

    #[must_use]
    pub fn tried_identities(&self) -> &[IdentityKey] {
        &self.tried_identities
    }

    #[must_use]
    pub const fn active_identity(&self) -> &IdentityKey {
        &self.active_identity
    }

    #[must_use]
    pub const fn state(&self) -> &SubmissionState {
        &self.state
    }

    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub const fn upstream_claim_id(&self) -> Option<&UpstreamClaimId> {
        self.upstream_claim_id.as_ref()
    }

    #[must_use]
    pub fn attempts(&self) -> &[SubmissionAttempt] {
        &self.attempts
    }

    #[must_use]
    pub const fn queued_at(&self) -> SystemTime {
        self.queued_at
    }

    #[must_use]
    pub const fn next_attempt_at(&self) -> Option<SystemTime> {
        self.next_attempt_at
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Whether the record has reached `Delivered` or `Failed`
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the scheduler may dispatch an attempt at `now`
    #[must_use]
    pub fn is_due(&self, now: SystemTime) -> bool {
        self.state == SubmissionState::Pending
            && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Append an eligible identity (candidate set is append-only)
    pub fn add_candidate_identity(&mut self, identity: IdentityKey) {
        if !self.candidate_identities.contains(&identity) {
            self.candidate_identities.push(identity);
        }
    }

    /// Begin an attempt: transition to `InFlight` and count it
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn begin_attempt(&mut self) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        self.state = SubmissionState::InFlight;
        self.attempt_count += 1;
        self.next_attempt_at = None;
        Ok(())
    }

    /// Record the outcome of an attempt in the audit history
    ///
    /// `error` is `None` for the successful attempt. A classified error
    /// also overwrites `last_error`.
    pub fn record_attempt(&mut self, error: Option<AttemptError>) {
        self.attempts.push(SubmissionAttempt {
            timestamp: SystemTime::now(),
            identity: self.active_identity.clone(),
            error: error.clone(),
        });
        if let Some(error) = error {
            self.last_error = Some(error);
        }
    }

    /// The upstream accepted the submission
    ///
    /// Sets the terminal `Delivered` state and stores the upstream claim
    /// id. The claim id is immutable thereafter.
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn deliver(&mut self, upstream_claim_id: UpstreamClaimId) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        self.state = SubmissionState::Delivered;
        self.upstream_claim_id = Some(upstream_claim_id);
        self.next_attempt_at = None;
        Ok(())
    }

    /// Schedule the next attempt of the current series
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn schedule_retry(&mut self, at: SystemTime) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        self.state = SubmissionState::Pending;
        self.next_attempt_at = Some(at);
        Ok(())
    }

    /// Reclaim an attempt that never reported an outcome
    ///
    /// A record persisted `InFlight` whose attempt died with its process
    /// (crash, shutdown grace timeout) is re-enqueued as `Pending` for
    /// immediate dispatch. The interrupted attempt keeps its place in
    /// `attempt_count`: it was started, so it spends budget.
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn reset_in_flight(&mut self) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        if self.state == SubmissionState::InFlight {
            self.state = SubmissionState::Pending;
            self.next_attempt_at = None;
        }
        Ok(())
    }

    /// The current identity's options are spent; await the fallback decision
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn mark_exhausted(&mut self) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        self.state = SubmissionState::ExhaustedPendingFallback;
        self.next_attempt_at = None;
        Ok(())
    }

    /// Move the active identity into the tried set
    ///
    /// Idempotent: an identity is recorded as tried at most once.
    pub fn mark_active_identity_tried(&mut self) {
        if !self.tried_identities.contains(&self.active_identity) {
            self.tried_identities.push(self.active_identity.clone());
        }
    }

    /// Rotate to an untried candidate identity and start a fresh series
    ///
    /// Resets `attempt_count` to 0 and re-enqueues the record as `Pending`
    /// with no backoff, so the scheduler starts the new attempt-series
    /// immediately.
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] for terminal records and
    /// [`RecordError::IdentityNotEligible`] if `next` is not an untried
    /// candidate.
    pub fn rotate_identity(&mut self, next: IdentityKey) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        if !self.candidate_identities.contains(&next) || self.tried_identities.contains(&next) {
            return Err(RecordError::IdentityNotEligible(next));
        }

        self.mark_active_identity_tried();
        self.active_identity = next;
        self.attempt_count = 0;
        self.state = SubmissionState::Pending;
        self.next_attempt_at = None;
        Ok(())
    }

    /// All automated options are exhausted
    ///
    /// # Errors
    /// Returns [`RecordError::Terminal`] if the record already reached a
    /// terminal state.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), RecordError> {
        self.guard_not_terminal()?;
        self.state = SubmissionState::Failed(reason.into());
        self.next_attempt_at = None;
        Ok(())
    }

    /// Bump the optimistic-concurrency stamp (ledger use only)
    #[doc(hidden)]
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    fn guard_not_terminal(&self) -> Result<(), RecordError> {
        if self.is_terminal() {
            Err(RecordError::Terminal(self.state.label()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(candidates: &[&str]) -> SubmissionRecord {
        SubmissionRecord::new(
            ClaimReference::new("claim-17"),
            candidates.iter().map(|c| IdentityKey::from(*c)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn new_record_requires_a_candidate() {
        let err = SubmissionRecord::new(ClaimReference::new("claim-17"), Vec::new());
        assert_eq!(err.unwrap_err(), RecordError::NoCandidateIdentities);
    }

    #[test]
    fn new_record_activates_first_candidate() {
        let record = record_with(&["A", "B"]);
        assert_eq!(record.active_identity().as_str(), "A");
        assert_eq!(record.state(), &SubmissionState::Pending);
        assert_eq!(record.attempt_count(), 0);
        assert!(record.tried_identities().is_empty());
    }

    #[test]
    fn begin_attempt_counts_and_goes_in_flight() {
        let mut record = record_with(&["A"]);
        record.begin_attempt().unwrap();
        assert_eq!(record.state(), &SubmissionState::InFlight);
        assert_eq!(record.attempt_count(), 1);
        record.schedule_retry(SystemTime::now()).unwrap();
        record.begin_attempt().unwrap();
        assert_eq!(record.attempt_count(), 2);
    }

    #[test]
    fn reset_in_flight_reclaims_an_interrupted_attempt() {
        let now = SystemTime::now();
        let mut record = record_with(&["A"]);
        record.begin_attempt().unwrap();
        assert!(!record.is_due(now));

        record.reset_in_flight().unwrap();
        assert_eq!(record.state(), &SubmissionState::Pending);
        assert!(record.is_due(now), "reclaimed record dispatches immediately");
        assert_eq!(
            record.attempt_count(),
            1,
            "the interrupted attempt still spends budget"
        );

        // No-op on anything but InFlight
        record
            .schedule_retry(now + std::time::Duration::from_secs(60))
            .unwrap();
        record.reset_in_flight().unwrap();
        assert_eq!(record.next_attempt_at(), Some(now + std::time::Duration::from_secs(60)));

        record.fail("done").unwrap();
        assert!(matches!(
            record.reset_in_flight(),
            Err(RecordError::Terminal(_))
        ));
    }

    #[test]
    fn deliver_is_terminal() {
        let mut record = record_with(&["A"]);
        record.begin_attempt().unwrap();
        record.deliver(UpstreamClaimId::new("600001")).unwrap();
        assert!(record.is_terminal());
        assert_eq!(record.upstream_claim_id().unwrap().as_str(), "600001");

        assert!(matches!(
            record.begin_attempt(),
            Err(RecordError::Terminal("delivered"))
        ));
        assert!(matches!(record.fail("nope"), Err(RecordError::Terminal(_))));
    }

    #[test]
    fn rotation_moves_active_into_tried_and_resets_count() {
        let mut record = record_with(&["A", "B"]);
        record.begin_attempt().unwrap();
        record.mark_exhausted().unwrap();

        record.rotate_identity(IdentityKey::from("B")).unwrap();
        assert_eq!(record.active_identity().as_str(), "B");
        assert_eq!(record.tried_identities(), &[IdentityKey::from("A")]);
        assert_eq!(record.attempt_count(), 0);
        assert_eq!(record.state(), &SubmissionState::Pending);
    }

    #[test]
    fn rotation_rejects_tried_or_foreign_identities() {
        let mut record = record_with(&["A", "B"]);
        record.rotate_identity(IdentityKey::from("B")).unwrap();

        // "A" is now tried, "C" was never a candidate
        assert!(matches!(
            record.rotate_identity(IdentityKey::from("A")),
            Err(RecordError::IdentityNotEligible(_))
        ));
        assert!(matches!(
            record.rotate_identity(IdentityKey::from("C")),
            Err(RecordError::IdentityNotEligible(_))
        ));
    }

    #[test]
    fn mark_active_identity_tried_is_idempotent() {
        let mut record = record_with(&["A"]);
        record.mark_active_identity_tried();
        record.mark_active_identity_tried();
        assert_eq!(record.tried_identities().len(), 1);
    }

    #[test]
    fn attempt_history_keeps_identity_and_error() {
        let mut record = record_with(&["A"]);
        record.begin_attempt().unwrap();
        record.record_attempt(Some(AttemptError {
            kind: ErrorKind::Transient,
            message: "gateway timeout".to_string(),
        }));
        record.record_attempt(None);

        assert_eq!(record.attempts().len(), 2);
        assert_eq!(record.attempts()[0].identity.as_str(), "A");
        assert_eq!(
            record.last_error().unwrap().kind,
            ErrorKind::Transient,
            "a successful attempt does not clear the last classified error"
        );
    }

    #[test]
    fn due_only_when_pending_and_past_backoff() {
        let now = SystemTime::now();
        let mut record = record_with(&["A"]);
        assert!(record.is_due(now));

        record.begin_attempt().unwrap();
        assert!(!record.is_due(now));

        record
            .schedule_retry(now + std::time::Duration::from_secs(60))
            .unwrap();
        assert!(!record.is_due(now));
        assert!(record.is_due(now + std::time::Duration::from_secs(61)));
    }

    #[test]
    fn submission_id_filename_round_trip() {
        let id = SubmissionId::generate();
        let parsed = SubmissionId::from_filename(&id.filename()).unwrap();
        assert_eq!(parsed, id);

        assert!(SubmissionId::from_filename("../etc/passwd.rec").is_none());
        assert!(SubmissionId::from_filename("not-a-ulid.rec").is_none());
        assert!(SubmissionId::from_filename("01ARYZ6S41").is_none());
    }
}

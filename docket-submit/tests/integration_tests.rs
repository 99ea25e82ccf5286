//! Integration tests for the submission processor
//!
//! These drive full records through the processor with scripted upstream
//! responses: delivery, same-identity retries, busy-condition fallback,
//! preparation failures, and final-failure notifications.
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{sync::Arc, time::Duration};

use docket_common::record::{
    AttemptError, ClaimReference, ErrorKind, IdentityKey, SubmissionRecord, SubmissionState,
};
use docket_ledger::{MemoryRecordStore, RecordStore};
use docket_submit::{
    ExhaustionHandler, ExhaustionNotice, FallbackOutcome, PreparationService,
    SubmissionProcessor, UpstreamError, UpstreamSubmitter,
};

use support::{FailingPreparer, RecordingNotifier, ScriptedUpstream, StaticPreparer, claimant};

fn test_record(candidates: &[&str]) -> SubmissionRecord {
    SubmissionRecord::new(
        ClaimReference::new("claim-600123456"),
        candidates.iter().map(|c| IdentityKey::from(*c)).collect(),
    )
    .expect("at least one candidate")
}

fn build_processor(
    upstream: &Arc<ScriptedUpstream>,
    notifier: &Arc<RecordingNotifier>,
    preparer: Arc<dyn PreparationService>,
    backup_notification: bool,
) -> (Arc<SubmissionProcessor>, Arc<MemoryRecordStore>) {
    let ledger = Arc::new(MemoryRecordStore::new());

    let mut processor = SubmissionProcessor::default();
    // Zero backoff so retries are due on the next cycle
    processor.retry.base_retry_delay_secs = 0;
    processor.retry.retry_jitter_factor = 0.0;
    processor.backup_notification = backup_notification;

    processor
        .init(
            ledger.clone(),
            vec![upstream.clone() as Arc<dyn UpstreamSubmitter>],
            preparer,
            notifier.clone(),
        )
        .expect("processor init");

    (Arc::new(processor), ledger)
}

/// Run dispatch cycles until every record in the working set settles
async fn drive_to_terminal(processor: &Arc<SubmissionProcessor>, max_cycles: usize) {
    for _ in 0..max_cycles {
        processor.process_once().await.expect("process cycle");

        if processor
            .queue()
            .all_records()
            .iter()
            .all(SubmissionRecord::is_terminal)
        {
            return;
        }
    }

    panic!("records did not settle within {max_cycles} cycles");
}

#[tokio::test]
async fn test_successful_submission_delivers_and_notifies() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_ok("600123456789");
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    let record = test_record(&["600049703"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 3).await;

    // The success notification is fire-and-forget
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Delivered));
    assert_eq!(
        stored.upstream_claim_id().map(|id| id.as_str()),
        Some("600123456789")
    );
    assert_eq!(stored.attempt_count(), 1);
    assert_eq!(upstream.calls(), 1);

    assert_eq!(
        notifier.success_addresses(),
        vec!["mara.notify@example.com".to_string()]
    );
    assert_eq!(notifier.failure_count(), 0);
}

#[tokio::test]
async fn test_delivered_records_get_no_further_attempts() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_ok("600123456789");
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, _ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    processor
        .enqueue(test_record(&["600049703"]))
        .await
        .expect("enqueue");

    drive_to_terminal(&processor, 3).await;

    processor.process_once().await.expect("extra cycle");
    processor.process_once().await.expect("extra cycle");

    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_transient_failures_retry_until_budget_then_fail() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err_repeated(14, || UpstreamError::Outage("connection refused".to_string()));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    let record = test_record(&["600049703"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 20).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Failed(_)));
    // The full budget was spent under the only identity, and never more
    assert_eq!(upstream.calls(), 14);
    assert_eq!(stored.attempt_count(), 14);
    assert_eq!(
        stored
            .tried_identities()
            .iter()
            .map(|key| key.as_str().to_string())
            .collect::<Vec<_>>(),
        vec!["600049703".to_string()]
    );

    let last_error = stored.last_error().expect("error recorded");
    assert_eq!(last_error.kind, ErrorKind::Transient);
    assert!(last_error.message.contains("connection refused"));

    // Transient exhaustion does not trigger the backup-intake notification
    assert_eq!(notifier.failure_count(), 0);
}

#[tokio::test]
async fn test_busy_condition_rotates_identity_immediately() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err(UpstreamError::Fault("PIF in use by another process".to_string()));
    upstream.push_ok("600111222333");
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    let record = test_record(&["600049703", "600049704"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 5).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Delivered));

    // Exactly one attempt under the first identity, then rotation
    assert_eq!(upstream.calls(), 2);
    assert_eq!(
        upstream.identities_seen(),
        vec!["600049703".to_string(), "600049704".to_string()]
    );
    assert_eq!(stored.active_identity().as_str(), "600049704");
    assert_eq!(stored.tried_identities().len(), 1);
    assert_eq!(stored.tried_identities()[0].as_str(), "600049703");

    // The rotation started a fresh attempt-series
    assert_eq!(stored.attempt_count(), 1);
}

#[tokio::test]
async fn test_preparation_failure_skips_upstream_but_still_falls_back() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) =
        build_processor(&upstream, &notifier, Arc::new(FailingPreparer), true);

    let record = test_record(&["600049703", "600049704"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 5).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Failed(_)));

    // The upstream was never contacted, yet classification and fallback
    // still ran: every candidate was consumed
    assert_eq!(upstream.calls(), 0);
    assert_eq!(stored.tried_identities().len(), 2);
    assert_eq!(
        stored.last_error().expect("error recorded").kind,
        ErrorKind::PermanentReject
    );

    // A permanent rejection is not the busy condition, so no
    // backup-intake notification
    assert_eq!(notifier.failure_count(), 0);
}

#[tokio::test]
async fn test_backup_notification_on_final_busy_failure() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err(UpstreamError::Fault("PIF in use by another process".to_string()));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        true,
    );

    let record = test_record(&["600049703"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 3).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Failed(_)));
    assert_eq!(
        stored.last_error().expect("error recorded").kind,
        ErrorKind::UpstreamBusy
    );

    assert_eq!(
        notifier.failure_addresses(),
        vec!["mara.notify@example.com".to_string()]
    );
    assert_eq!(notifier.success_count(), 0);
}

#[tokio::test]
async fn test_backup_notification_requires_toggle() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err(UpstreamError::Fault("PIF in use by another process".to_string()));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, _ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    processor
        .enqueue(test_record(&["600049703"]))
        .await
        .expect("enqueue");

    drive_to_terminal(&processor, 3).await;

    assert_eq!(notifier.failure_count(), 0);
}

#[tokio::test]
async fn test_permanent_rejection_consumes_one_attempt_per_identity() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err_repeated(3, || UpstreamError::Rejected("duplicate claim".to_string()));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    let record = test_record(&["600049703", "600049704", "600049705"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 10).await;

    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(matches!(stored.state(), SubmissionState::Failed(_)));

    // Each identity gets exactly one attempt before rotation, so the
    // record settles after a bounded number of calls
    assert_eq!(upstream.calls(), 3);
    assert_eq!(stored.tried_identities().len(), 3);
    assert_eq!(
        upstream.identities_seen(),
        vec![
            "600049703".to_string(),
            "600049704".to_string(),
            "600049705".to_string()
        ]
    );
}

#[tokio::test]
async fn test_exhaustion_notice_for_settled_record_is_ignored() {
    let upstream = Arc::new(ScriptedUpstream::new("primary"));
    upstream.push_err(UpstreamError::Rejected("duplicate claim".to_string()));
    let notifier = Arc::new(RecordingNotifier::default());

    let (processor, ledger) = build_processor(
        &upstream,
        &notifier,
        Arc::new(StaticPreparer::new()),
        false,
    );

    let record = test_record(&["600049703"]);
    let id = record.id().clone();
    processor.enqueue(record).await.expect("enqueue");

    drive_to_terminal(&processor, 3).await;

    // A duplicate notice arrives after the record settled
    let late_notifier = Arc::new(RecordingNotifier::default());
    let handler = ExhaustionHandler::new(
        ledger.clone() as Arc<dyn RecordStore>,
        late_notifier.clone(),
        "primary".to_string(),
        true,
    );

    let notice = ExhaustionNotice {
        submission_id: id.clone(),
        last_error: AttemptError {
            kind: ErrorKind::UpstreamBusy,
            message: "PIF in use by another process".to_string(),
        },
        attempts: 14,
        claimant: Some(claimant()),
    };

    let (settled, outcome) = handler.handle(&notice).await.expect("handle notice");
    assert_eq!(outcome, FallbackOutcome::AlreadySettled);
    assert!(matches!(settled.state(), SubmissionState::Failed(_)));

    // The settled record was not touched: no notification, no rotation
    assert_eq!(late_notifier.failure_count(), 0);
    let stored = ledger.load(&id).await.expect("record persisted");
    assert!(stored.tried_identities().len() <= 1);
}

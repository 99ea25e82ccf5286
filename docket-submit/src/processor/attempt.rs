//! Single-attempt execution and error routing.

use std::{sync::Arc, time::SystemTime};

use docket_common::{
    claimant::ClaimantProfile,
    record::{AttemptError, ErrorKind, SubmissionId, SubmissionRecord, SubmissionState},
    upstream,
};
use docket_ledger::LedgerError;
use tracing::{error, warn};

use crate::{
    error::SubmitError,
    fallback::ExhaustionNotice,
    processor::SubmissionProcessor,
    tracker::JobStatusTracker,
};

/// Drive one record through one attempt (spawned as a task)
///
/// Errors here are task-fatal, not process-fatal: they are logged and the
/// record is left for the next cycle (or an operator) to pick up.
pub(crate) async fn attempt_submission(processor: &Arc<SubmissionProcessor>, id: SubmissionId) {
    if let Err(e) = run_attempt(processor, &id).await {
        error!(
            submission_id = %id,
            error = %e,
            "Submission attempt aborted"
        );
    }
}

async fn run_attempt(
    processor: &Arc<SubmissionProcessor>,
    id: &SubmissionId,
) -> Result<(), SubmitError> {
    let ledger = processor.ledger()?;
    let submitter = processor.submitter()?;

    // The ledger copy is authoritative; the queue copy may be stale
    let mut record = match ledger.load(id).await {
        Ok(record) => record,
        Err(LedgerError::NotFound(_)) => {
            warn!(
                submission_id = %id,
                "Record disappeared from ledger, dropping from working set"
            );
            processor.queue.remove(id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if record.is_terminal() {
        // Settled out-of-band since the dispatch cycle collected it
        processor.queue.sync(record);
        return Ok(());
    }

    record
        .begin_attempt()
        .map_err(|e| crate::error::SystemError::Internal(e.to_string()))?;

    // Claiming the attempt through the version gate is what guarantees a
    // record never has two attempts in flight: the losing writer backs off.
    if !persist(processor, &mut record).await? {
        return Ok(());
    }

    JobStatusTracker::on_attempt_start(&record, submitter.name());

    let payload = match processor.preparer()?.prepare(record.claim_ref()).await {
        Ok(payload) => payload,
        Err(e) => {
            // A preparation failure is a failed attempt with no upstream
            // call, classified through the same boundary as a submission
            // failure.
            let kind = processor.classifier.classify(&e);
            return handle_attempt_error(processor, record, kind, e.to_string(), None).await;
        }
    };

    upstream!(
        level = DEBUG,
        "Submitting {} to {} (attempt {})",
        record.id(),
        submitter.name(),
        record.attempt_count()
    );

    let started = SystemTime::now();
    match submitter.submit(record.active_identity(), &payload).await {
        Ok(response) => {
            record.record_attempt(None);
            record
                .deliver(response.upstream_claim_id)
                .map_err(|e| crate::error::SystemError::Internal(e.to_string()))?;

            if !persist(processor, &mut record).await? {
                return Ok(());
            }

            let duration_secs = started.elapsed().map_or(0.0, |d| d.as_secs_f64());
            JobStatusTracker::on_delivered(&record, submitter.name(), duration_secs);

            notify_success(processor, &record, &payload.claimant);

            Ok(())
        }
        Err(upstream_error) => {
            let kind = processor.classifier.classify(&upstream_error);
            handle_attempt_error(
                processor,
                record,
                kind,
                upstream_error.to_string(),
                Some(payload.claimant),
            )
            .await
        }
    }
}

/// Route a failed attempt: same-identity retry, or exhaustion
async fn handle_attempt_error(
    processor: &Arc<SubmissionProcessor>,
    mut record: SubmissionRecord,
    kind: ErrorKind,
    message: String,
    claimant: Option<ClaimantProfile>,
) -> Result<(), SubmitError> {
    let submitter = processor.submitter()?;

    let attempt_error = AttemptError { kind, message };
    record.record_attempt(Some(attempt_error.clone()));

    if kind.retries_same_identity() && processor.retry.should_retry(record.attempt_count()) {
        let next_attempt_at = processor.retry.calculate_next_attempt(record.attempt_count());
        record
            .schedule_retry(next_attempt_at)
            .map_err(|e| crate::error::SystemError::Internal(e.to_string()))?;

        if !persist(processor, &mut record).await? {
            return Ok(());
        }

        let delay_secs = next_attempt_at
            .duration_since(SystemTime::now())
            .unwrap_or_default()
            .as_secs();
        JobStatusTracker::on_retry_scheduled(&record, submitter.name(), delay_secs);

        return Ok(());
    }

    // Budget spent or not retryable under this identity
    record
        .mark_exhausted()
        .map_err(|e| crate::error::SystemError::Internal(e.to_string()))?;

    if !persist(processor, &mut record).await? {
        return Ok(());
    }

    JobStatusTracker::on_exhausted(&record, submitter.name());

    let notice = ExhaustionNotice {
        submission_id: record.id().clone(),
        last_error: attempt_error,
        attempts: record.attempt_count(),
        claimant,
    };

    match processor.handler()?.handle(&notice).await {
        Ok((updated, _outcome)) => {
            processor.queue.sync(updated);
            Ok(())
        }
        Err(e) => {
            // The record stays ExhaustedPendingFallback; the next dispatch
            // cycle re-derives the notice from the persisted state (see
            // resolve_exhaustion), so nothing is lost.
            error!(
                submission_id = %record.id(),
                error = %e,
                "Failed to handle exhaustion notice"
            );
            Err(e)
        }
    }
}

/// Resolve a record left awaiting the fallback decision (spawned path)
///
/// The normal path runs the decision inline at the end of the attempt
/// that exhausted the identity. When that call fails, or the process dies
/// between persisting `ExhaustedPendingFallback` and the decision, the
/// dispatch cycle routes the record here and the notice is re-derived
/// from the persisted state. Claimant data is not persisted, so a
/// re-derived final failure on the busy condition logs a warning instead
/// of sending the backup-intake notification.
pub(crate) async fn resolve_exhaustion(processor: &Arc<SubmissionProcessor>, id: SubmissionId) {
    if let Err(e) = run_fallback(processor, &id).await {
        error!(
            submission_id = %id,
            error = %e,
            "Fallback resolution failed, record stays queued for the next cycle"
        );
    }
}

async fn run_fallback(
    processor: &Arc<SubmissionProcessor>,
    id: &SubmissionId,
) -> Result<(), SubmitError> {
    let ledger = processor.ledger()?;

    let record = match ledger.load(id).await {
        Ok(record) => record,
        Err(LedgerError::NotFound(_)) => {
            warn!(
                submission_id = %id,
                "Record disappeared from ledger, dropping from working set"
            );
            processor.queue.remove(id);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if !matches!(record.state(), SubmissionState::ExhaustedPendingFallback) {
        // Settled or re-enqueued out-of-band; take the fresh copy
        processor.queue.sync(record);
        return Ok(());
    }

    let last_error = record.last_error().cloned().unwrap_or_else(|| AttemptError {
        kind: ErrorKind::Unknown,
        message: "exhausted with no recorded attempt error".to_string(),
    });

    let notice = ExhaustionNotice {
        submission_id: record.id().clone(),
        last_error,
        attempts: record.attempt_count(),
        claimant: None,
    };

    let (updated, _outcome) = processor.handler()?.handle(&notice).await?;
    processor.queue.sync(updated);

    Ok(())
}

/// Persist a mutation and refresh the working set
///
/// Returns `Ok(false)` on a version conflict: another writer settled the
/// record first, so this attempt abandons its claim and re-syncs the
/// working set from the winner's copy.
async fn persist(
    processor: &Arc<SubmissionProcessor>,
    record: &mut SubmissionRecord,
) -> Result<bool, SubmitError> {
    let ledger = processor.ledger()?;

    match ledger.update(record).await {
        Ok(()) => {
            processor.queue.sync(record.clone());
            Ok(true)
        }
        Err(LedgerError::VersionConflict { held, stored, .. }) => {
            warn!(
                submission_id = %record.id(),
                held = held,
                stored = stored,
                "Record changed concurrently, abandoning this attempt"
            );
            if let Ok(fresh) = ledger.load(record.id()).await {
                processor.queue.sync(fresh);
            }
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Fire-and-forget success notification
///
/// Spawned so a slow notification channel never blocks the dispatch
/// cycle; failures are logged and never affect the delivered record.
fn notify_success(
    processor: &Arc<SubmissionProcessor>,
    record: &SubmissionRecord,
    claimant: &ClaimantProfile,
) {
    let Some(notifier) = processor.notifier.clone() else {
        return;
    };

    let Some(address) = claimant.notify_email.clone() else {
        warn!(
            submission_id = %record.id(),
            "Cannot send success notification: claimant has no notification address"
        );
        return;
    };

    let params = claimant.template_params();
    let id = record.id().clone();

    tokio::spawn(async move {
        if let Err(e) = notifier.send_success(&address, &params).await {
            warn!(
                submission_id = %id,
                error = %e,
                "Failed to send success notification"
            );
        }
    });
}

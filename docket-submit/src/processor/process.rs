//! Dispatch-cycle logic: which records get an attempt, and in parallel.

use std::{sync::Arc, time::SystemTime};

use docket_common::record::{SubmissionRecord, SubmissionState};
use docket_ledger::LedgerError;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{error::SubmitError, processor::SubmissionProcessor, tracker::JobStatusTracker};

/// Re-sync the working set from the ledger
///
/// Loads any ledger record not yet in the working set. Terminal records
/// are skipped: they need no further driving, and keeping them out of the
/// queue keeps the working set bounded by active work. Records persisted
/// `InFlight` are reclaimed (see [`reclaim_interrupted`]) so an attempt
/// interrupted by a crash or the shutdown grace timeout is re-dispatched
/// rather than stranded.
///
/// Returns the number of records newly added.
///
/// # Errors
/// Returns an error if the ledger cannot be listed.
pub async fn scan_ledger_internal(
    processor: &Arc<SubmissionProcessor>,
) -> Result<usize, SubmitError> {
    let ledger = processor.ledger()?;
    let mut added = 0;

    for id in ledger.list().await? {
        if processor.queue.contains(&id) {
            continue;
        }

        match ledger.load(&id).await {
            Ok(mut record) => {
                if record.is_terminal() {
                    continue;
                }

                if matches!(record.state(), SubmissionState::InFlight) {
                    reclaim_interrupted(processor, &mut record).await;
                }

                processor.queue.sync(record);
                added += 1;
            }
            Err(e) => {
                error!(submission_id = %id, error = %e, "Failed to load record during ledger scan");
            }
        }
    }

    Ok(added)
}

/// Reset a stale `InFlight` record back to `Pending`
///
/// Every live attempt registers its record in the working set, so a
/// record that is `InFlight` in the ledger but absent from the working
/// set has no attempt driving it: the task that claimed it died with its
/// process. A version conflict means some writer beat us to it, in which
/// case its copy wins.
async fn reclaim_interrupted(
    processor: &Arc<SubmissionProcessor>,
    record: &mut SubmissionRecord,
) {
    let Ok(ledger) = processor.ledger() else {
        return;
    };

    if record.reset_in_flight().is_err() {
        return;
    }

    match ledger.update(record).await {
        Ok(()) => {
            warn!(
                submission_id = %record.id(),
                attempt = record.attempt_count(),
                "Reclaimed interrupted attempt, record re-enqueued"
            );
        }
        Err(LedgerError::VersionConflict { .. }) => {
            if let Ok(fresh) = ledger.load(record.id()).await {
                *record = fresh;
            }
        }
        Err(e) => {
            error!(
                submission_id = %record.id(),
                error = %e,
                "Failed to reclaim interrupted attempt"
            );
        }
    }
}

/// Process all due records in the working set with parallel attempts
///
/// A record is due when it is `Pending` and its backoff (if any) has
/// elapsed. Terminal and `InFlight` records are skipped. Records awaiting
/// a fallback decision get that decision resolved instead of an attempt:
/// the normal path runs it inline when the attempt-series ends, so one
/// still waiting here was interrupted and is re-derived from its
/// persisted state. Each due record gets exactly one attempt per cycle,
/// with at most `max_concurrent_attempts` running in parallel.
///
/// # Errors
/// Returns an error if the processor is not initialized.
pub async fn process_queue_internal(
    processor: &Arc<SubmissionProcessor>,
) -> Result<(), SubmitError> {
    // Fail fast before spawning anything
    let _ = processor.ledger()?;

    let now = SystemTime::now();

    let all_records = processor.queue.all_records();

    let (pending, in_flight, delivered, exhausted, failed) = processor.queue.counts_by_state();
    JobStatusTracker::on_queue_counts(pending, in_flight, delivered, exhausted, failed);

    let mut due = Vec::new();
    let mut awaiting_fallback = Vec::new();
    for record in all_records {
        if record.is_due(now) {
            due.push(record);
        } else if matches!(record.state(), SubmissionState::ExhaustedPendingFallback) {
            awaiting_fallback.push(record);
        }
    }

    for record in awaiting_fallback {
        super::attempt::resolve_exhaustion(processor, record.id().clone()).await;
    }

    if due.is_empty() {
        return Ok(());
    }

    info!(
        due_count = due.len(),
        max_concurrent = processor.max_concurrent_attempts,
        "Processing submission queue with parallel workers"
    );

    let mut join_set: JoinSet<()> = JoinSet::new();
    let mut due_iter = due.into_iter();

    // Spawn the initial batch of tasks (up to max_concurrent_attempts)
    for _ in 0..processor.max_concurrent_attempts.max(1) {
        if let Some(record) = due_iter.next() {
            let processor_clone = Arc::clone(processor);

            join_set.spawn(async move {
                super::attempt::attempt_submission(&processor_clone, record.id().clone()).await;
            });
        }
    }

    // As tasks complete, spawn new ones for remaining records
    while join_set.join_next().await.is_some() {
        if let Some(record) = due_iter.next() {
            let processor_clone = Arc::clone(processor);

            join_set.spawn(async move {
                super::attempt::attempt_submission(&processor_clone, record.id().clone()).await;
            });
        }
    }

    Ok(())
}

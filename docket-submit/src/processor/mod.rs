//! Submission processor orchestration

pub mod attempt;
pub mod process;

use std::{sync::Arc, time::Duration};

use docket_common::{Signal, internal, record::SubmissionRecord};
use docket_ledger::RecordStore;
use serde::Deserialize;

use crate::{
    classifier::ErrorClassifier,
    error::{SubmitError, SystemError},
    fallback::ExhaustionHandler,
    notify::Notifier,
    policy::RetryPolicy,
    prepare::PreparationService,
    queue::SubmissionQueue,
    tracker::JobStatusTracker,
    upstream::UpstreamSubmitter,
};

const fn default_scan_interval() -> u64 {
    30
}

const fn default_process_interval() -> u64 {
    5
}

fn default_max_concurrent_attempts() -> usize {
    num_cpus::get()
}

fn default_upstream() -> String {
    "primary".to_string()
}

const fn default_shutdown_grace() -> u64 {
    30
}

/// Processor driving submission records to a terminal state
///
/// The processor runs continuously, re-syncing its working set from the
/// ledger and dispatching due records at configurable intervals. Records
/// enter through [`SubmissionProcessor::enqueue`]; every record is driven
/// until it reaches `Delivered` or `Failed`.
#[derive(Debug, Deserialize)]
pub struct SubmissionProcessor {
    /// How often to re-sync the working set from the ledger (in seconds)
    ///
    /// The sync picks up records inserted out-of-band and rehydrates the
    /// queue after a restart.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// How often to dispatch due records (in seconds)
    #[serde(default = "default_process_interval")]
    pub process_interval_secs: u64,

    /// Maximum number of submission attempts running in parallel
    ///
    /// Distinct records only: a record never has more than one attempt in
    /// flight.
    #[serde(default = "default_max_concurrent_attempts")]
    pub max_concurrent_attempts: usize,

    /// Retry budget and backoff configuration
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Error classification configuration (busy phrases)
    #[serde(default)]
    pub classifier: ErrorClassifier,

    /// Name of the upstream backend to submit to
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Send the backup-intake notification when a record finally fails on
    /// the busy condition
    #[serde(default)]
    pub backup_notification: bool,

    /// How long to wait for in-flight attempts on shutdown (in seconds)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// The ledger records are persisted to (initialized in `init()`)
    #[serde(skip)]
    pub(crate) ledger: Option<Arc<dyn RecordStore>>,

    /// The selected upstream backend (initialized in `init()`)
    #[serde(skip)]
    pub(crate) submitter: Option<Arc<dyn UpstreamSubmitter>>,

    /// Payload preparation service (initialized in `init()`)
    #[serde(skip)]
    pub(crate) preparer: Option<Arc<dyn PreparationService>>,

    /// Claimant notification channel (initialized in `init()`)
    #[serde(skip)]
    pub(crate) notifier: Option<Arc<dyn Notifier>>,

    /// Fallback decision handler (initialized in `init()`)
    #[serde(skip)]
    pub(crate) handler: Option<ExhaustionHandler>,

    /// The in-memory working set
    #[serde(skip)]
    pub(crate) queue: SubmissionQueue,
}

impl Default for SubmissionProcessor {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            process_interval_secs: default_process_interval(),
            max_concurrent_attempts: default_max_concurrent_attempts(),
            retry: RetryPolicy::default(),
            classifier: ErrorClassifier::default(),
            upstream: default_upstream(),
            backup_notification: false,
            shutdown_grace_secs: default_shutdown_grace(),
            ledger: None,
            submitter: None,
            preparer: None,
            notifier: None,
            handler: None,
            queue: SubmissionQueue::new(),
        }
    }
}

impl SubmissionProcessor {
    /// Initialize the submission processor
    ///
    /// Selects the configured upstream backend from `upstreams` by name
    /// and wires the collaborators together.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no registered upstream matches the
    /// configured name.
    pub fn init(
        &mut self,
        ledger: Arc<dyn RecordStore>,
        upstreams: Vec<Arc<dyn UpstreamSubmitter>>,
        preparer: Arc<dyn PreparationService>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(), SubmitError> {
        internal!("Initialising Submission Processor ...");

        let submitter = upstreams
            .into_iter()
            .find(|upstream| upstream.name() == self.upstream)
            .ok_or_else(|| {
                SystemError::Configuration(format!(
                    "No upstream backend registered under name {:?}",
                    self.upstream
                ))
            })?;

        internal!("Submitting to upstream {:?}", submitter.name());

        self.handler = Some(ExhaustionHandler::new(
            ledger.clone(),
            notifier.clone(),
            self.upstream.clone(),
            self.backup_notification,
        ));
        self.ledger = Some(ledger);
        self.submitter = Some(submitter);
        self.preparer = Some(preparer);
        self.notifier = Some(notifier);

        Ok(())
    }

    /// Accept a new record: persist it, then add it to the working set
    ///
    /// # Errors
    ///
    /// Returns an error if the processor is not initialized or the ledger
    /// insert fails.
    pub async fn enqueue(&self, record: SubmissionRecord) -> Result<(), SubmitError> {
        let ledger = self.ledger()?;

        ledger.insert(&record).await?;
        JobStatusTracker::on_queued(&record);
        self.queue.sync(record);

        Ok(())
    }

    /// Run one dispatch cycle over the working set
    ///
    /// Drives every due record through one attempt. Used directly by tests
    /// and by the `serve` loop's process tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor is not initialized.
    pub async fn process_once(self: &Arc<Self>) -> Result<(), SubmitError> {
        process::process_queue_internal(self).await
    }

    /// Re-sync the working set from the ledger
    ///
    /// Loads every non-terminal ledger record not already in the working
    /// set, reclaiming records whose attempt was interrupted mid-flight.
    /// This is how the queue is rehydrated after a restart; the `serve`
    /// loop runs it on every scan tick. Returns the number of records
    /// newly added.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor is not initialized or the ledger
    /// cannot be listed.
    pub async fn scan_ledger(self: &Arc<Self>) -> Result<usize, SubmitError> {
        process::scan_ledger_internal(self).await
    }

    /// Run the submission processor
    ///
    /// This method runs continuously until a shutdown signal is received.
    /// It periodically re-syncs the working set from the ledger and
    /// dispatches due records.
    ///
    /// ## Graceful Shutdown
    ///
    /// When a shutdown signal is received:
    /// 1. Stop accepting new work (scan/process ticks)
    /// 2. Wait for in-flight attempts to complete (bounded by
    ///    `shutdown_grace_secs`)
    /// 3. Exit cleanly
    ///
    /// In-flight attempts that don't complete within the grace period are
    /// persisted as `InFlight` and picked up again after a restart via the
    /// ledger sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission processor encounters a fatal
    /// error.
    pub async fn serve(
        self: &Arc<Self>,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), SubmitError> {
        internal!("Submission processor starting");

        // Fail fast if init() was skipped
        let _ = self.ledger()?;

        let scan_interval = Duration::from_secs(self.scan_interval_secs);
        let process_interval = Duration::from_secs(self.process_interval_secs);

        let mut scan_timer = tokio::time::interval(scan_interval);
        let mut process_timer = tokio::time::interval(process_interval);

        // Skip the first tick to avoid immediate execution
        scan_timer.tick().await;
        process_timer.tick().await;

        // Track whether a dispatch cycle is currently running
        let processing = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let processing_clone = processing.clone();

        loop {
            tokio::select! {
                _ = scan_timer.tick() => {
                    match process::scan_ledger_internal(self).await {
                        Ok(count) if count > 0 => {
                            tracing::info!("Scanned ledger, found {count} new records");
                        }
                        Ok(_) => {
                            tracing::debug!("Scanned ledger, no new records");
                        }
                        Err(e) => {
                            tracing::error!("Error scanning ledger: {e}");
                        }
                    }
                }
                _ = process_timer.tick() => {
                    processing.store(true, std::sync::atomic::Ordering::SeqCst);

                    match process::process_queue_internal(self).await {
                        Ok(()) => {
                            tracing::debug!("Processed submission queue");
                        }
                        Err(e) => {
                            tracing::error!("Error processing submission queue: {e}");
                        }
                    }

                    processing.store(false, std::sync::atomic::Ordering::SeqCst);
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) => {
                            internal!("Submission processor received shutdown signal");

                            let grace = Duration::from_secs(self.shutdown_grace_secs);
                            let start = std::time::Instant::now();

                            while processing_clone.load(std::sync::atomic::Ordering::SeqCst) {
                                if start.elapsed() >= grace {
                                    tracing::warn!(
                                        "Shutdown grace period exceeded, in-flight attempts will resume after restart"
                                    );
                                    break;
                                }

                                tracing::debug!(
                                    "Waiting for in-flight attempts to complete ({:.1}s elapsed)...",
                                    start.elapsed().as_secs_f64()
                                );
                                tokio::time::sleep(Duration::from_millis(100)).await;
                            }

                            if !processing_clone.load(std::sync::atomic::Ordering::SeqCst) {
                                internal!("All in-flight attempts completed");
                            }

                            // Record state is persisted to the ledger on every
                            // transition, nothing further to flush
                            internal!("Submission processor shutdown complete");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Submission processor shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Get a reference to the working set
    pub const fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    pub(crate) fn ledger(&self) -> Result<&Arc<dyn RecordStore>, SubmitError> {
        self.ledger.as_ref().ok_or_else(|| {
            SystemError::NotInitialized(
                "Submission processor not initialized. Call init() first.".to_string(),
            )
            .into()
        })
    }

    pub(crate) fn submitter(&self) -> Result<&Arc<dyn UpstreamSubmitter>, SubmitError> {
        self.submitter.as_ref().ok_or_else(|| {
            SystemError::NotInitialized(
                "Submission processor not initialized. Call init() first.".to_string(),
            )
            .into()
        })
    }

    pub(crate) fn preparer(&self) -> Result<&Arc<dyn PreparationService>, SubmitError> {
        self.preparer.as_ref().ok_or_else(|| {
            SystemError::NotInitialized(
                "Submission processor not initialized. Call init() first.".to_string(),
            )
            .into()
        })
    }

    pub(crate) fn handler(&self) -> Result<&ExhaustionHandler, SubmitError> {
        self.handler.as_ref().ok_or_else(|| {
            SystemError::NotInitialized(
                "Submission processor not initialized. Call init() first.".to_string(),
            )
            .into()
        })
    }
}

//! Submission queue and processor for driving claim records upstream
//!
//! This module provides functionality to:
//! - Track claim submissions pending delivery to an upstream intake
//! - Manage submission attempts, retries, and identity fallback
//! - Prepare claim payloads for each attempt
//! - Classify upstream failures into routing decisions

mod classifier;
mod error;
mod fallback;
mod notify;
mod policy;
mod pool;
mod prepare;
mod processor;
pub mod queue;
mod service;
mod tracker;
mod upstream;

// Re-export classification types
pub use classifier::ErrorClassifier;
// Re-export error types
pub use error::{SubmitError, SystemError, UpstreamError};
// Re-export fallback types
pub use fallback::{ExhaustionHandler, ExhaustionNotice, FallbackOutcome};
// Re-export notification types
pub use notify::{Notifier, NotifyError, TemplateParams};
// Re-export policy types
pub use policy::RetryPolicy;
pub use pool::IdentifierPool;
// Re-export preparation types
pub use prepare::{PreparationService, SubmissionPayload};
// Re-export core types
pub use processor::SubmissionProcessor;
pub use queue::SubmissionQueue;
pub use service::SubmissionQueryService;
pub use tracker::JobStatusTracker;
pub use upstream::{UpstreamResponse, UpstreamSubmitter};

//! Shared domain types for the docket submission orchestrator.
//!
//! This crate holds everything the other docket crates agree on:
//! - The [`record::SubmissionRecord`] lifecycle entity and its state machine
//! - The [`claimant::ClaimantProfile`] value object
//! - Structured audit logging with PII redaction ([`audit`])
//! - Logging initialization and macros ([`logging`])

pub mod audit;
pub mod claimant;
pub mod logging;
pub mod record;

pub use tracing;

/// Signal broadcast to long-running tasks when the process is shutting down.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}

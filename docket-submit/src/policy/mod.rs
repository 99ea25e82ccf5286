//! Submission policy abstractions

pub mod retry;

pub use retry::RetryPolicy;

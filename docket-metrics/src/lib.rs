//! OpenTelemetry metrics for the docket submission orchestrator
//!
//! This crate exports metrics via OTLP to an OpenTelemetry Collector, which
//! can expose them in Prometheus format for scraping.
//!
//! # Features
//!
//! - **Submission Metrics**: Attempt counts by outcome, delivery durations,
//!   retries, identity fallbacks, working-set sizes by record state
//! - **OTLP Export**: Push metrics to an OpenTelemetry Collector
//!
//! # Usage
//!
//! ```rust,no_run
//! use docket_metrics::{MetricsConfig, init_metrics};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MetricsConfig {
//!     enabled: true,
//!     endpoint: "http://localhost:4318".to_string(),
//! };
//!
//! init_metrics(&config)?;
//!
//! // Metrics are now pushed to the OpenTelemetry Collector
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod exporter;
mod submission;

pub use config::MetricsConfig;
pub use error::MetricsError;
use once_cell::sync::OnceCell;
pub use submission::SubmissionMetrics;

/// Global metrics instance
static METRICS_INSTANCE: OnceCell<Metrics> = OnceCell::new();

/// Root metrics container
#[derive(Debug)]
pub struct Metrics {
    pub submission: SubmissionMetrics,
}

/// Initialize the metrics system
///
/// This must be called once at startup before any metrics are recorded.
/// If metrics are disabled in the config, this is a no-op.
///
/// Metrics will be pushed to the configured OTLP endpoint (typically an
/// OpenTelemetry Collector) which can then expose them for Prometheus to
/// scrape.
///
/// # Errors
///
/// Returns an error if metrics initialization fails or if called multiple
/// times.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        tracing::info!("Metrics collection is disabled");
        return Ok(());
    }

    tracing::info!(
        endpoint = %config.endpoint,
        "Initializing OpenTelemetry metrics with OTLP exporter"
    );

    let provider = exporter::init_otlp_exporter(&config.endpoint)?;

    // Install the provider as the global meter provider
    opentelemetry::global::set_meter_provider(provider);

    let metrics = Metrics {
        submission: SubmissionMetrics::new()?,
    };

    METRICS_INSTANCE
        .set(metrics)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    tracing::info!("Metrics collection initialized successfully");

    Ok(())
}

/// Get a reference to the global metrics instance
///
/// # Panics
///
/// Panics if metrics have not been initialized via `init_metrics()`.
#[must_use]
pub fn metrics() -> &'static Metrics {
    METRICS_INSTANCE
        .get()
        .expect("Metrics not initialized. Call init_metrics() first.")
}

/// Check if metrics are enabled
#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}

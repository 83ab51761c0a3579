//! Prometheus metrics for the lost-items pipelines.
//!
//! Counters are recorded through the `metrics` facade wherever the pipelines
//! make progress; without an installed recorder they are no-ops. Install the
//! exporter once per process:
//!
//! ```rust,no_run
//! use lost_items_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus scrape endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, started: false }
    }

    /// Install the recorder and start serving `/metrics`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed or
    /// the listener cannot be set up.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        if self.started {
            return Ok(());
        }
        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();
        self.started = true;

        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "lost_items_discovered_total",
        "Lost item candidates parsed by the discovery run"
    );
    describe_counter!(
        "lost_items_submitted_total",
        "Purchase requests accepted by the workflow service"
    );
    describe_counter!(
        "lost_items_submission_failures_total",
        "Purchase requests the workflow service did not accept"
    );
    describe_counter!(
        "lost_items_keyless_submissions_total",
        "Purchase requests the workflow accepted without returning a key"
    );
    describe_counter!(
        "lost_items_decisions_total",
        "Workflow decisions applied to catalog items, by decision"
    );
    describe_counter!(
        "lost_items_suppressed_total",
        "Holdings and instances hidden from discovery, by level"
    );
    describe_counter!(
        "lost_items_runs_skipped_total",
        "Scheduled runs skipped because the previous run was still active, by trigger"
    );
}

//! # Lost Items Runtime
//!
//! Executes the lost-item lifecycle against a real catalog and workflow
//! service.
//!
//! ## Core Components
//!
//! - **`ItemStore`**: runs the lifecycle reducer and executes its effects in order
//! - **`CatalogGateway`**: typed access to the catalog resource paths
//! - **`Enricher`**: usage, retention, damage and instance context for new requests
//! - **`SuppressionCascade`**: hides emptied holdings and instances
//! - **`LifecycleEngine`**: the discovery and reconciliation pipelines
//! - **`Scheduler`**: cron triggers, one run per trigger at a time, graceful shutdown
//!
//! ## Example
//!
//! ```ignore
//! use lost_items_runtime::{LifecycleEngine, Scheduler, schedule_engine};
//!
//! let engine = Arc::new(LifecycleEngine::new(catalog, workflow, &config, clock).await);
//! let mut scheduler = Scheduler::new(Duration::from_secs(30));
//! schedule_engine(&mut scheduler, engine, discovery_schedule, reconciliation_schedule);
//!
//! tokio::signal::ctrl_c().await?;
//! scheduler.shutdown().await;
//! ```

/// Suppression cascade over holdings and instances
pub mod cascade;

/// Discovery and reconciliation pipelines
pub mod engine;

/// Pre-submission enrichment
pub mod enrichment;

/// Typed catalog paths
pub mod gateway;

/// Prometheus metrics for observability
pub mod metrics;

/// Cron triggers and shutdown
pub mod scheduler;

/// Per-trigger mutual exclusion
pub mod single_flight;

/// Effect execution
pub mod store;

pub use cascade::{CascadeOutcome, SuppressionCascade};
pub use engine::{DiscoveryReport, LifecycleEngine, ReconciliationReport};
pub use enrichment::{Enricher, RetentionTable};
pub use gateway::CatalogGateway;
pub use scheduler::{Scheduler, schedule_engine};
pub use single_flight::{SingleFlight, Trigger};
pub use store::{ItemStore, SendReport};

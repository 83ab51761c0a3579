//! Lost-items service
//!
//! Finds lost and damaged FOLIO items, asks the purchase-request workflow
//! whether to replace them, and applies the selectors' decisions back to the
//! catalog. Both jobs run on their own cron schedule until the process is
//! stopped.
//!
//! # Usage
//!
//! ```bash
//! LOST_ITEMS_CONFIG=/etc/lost-items/lost-items.toml lost-items
//! ```
//!
//! Credentials may come from `FOLIO_USERNAME`, `FOLIO_PASSWORD`,
//! `WORKFLOW_USERNAME` and `WORKFLOW_PASSWORD`, including through a `.env`
//! file.

mod signal;

use anyhow::Context;
use lost_items_core::config::LostItemsConfig;
use lost_items_core::environment::{CatalogClient, SystemClock, WorkflowClient};
use lost_items_folio::FolioClient;
use lost_items_runtime::metrics::{MetricsServer, register_metrics};
use lost_items_runtime::{LifecycleEngine, Scheduler, schedule_engine};
use lost_items_workflow::WorkflowHttpClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time an in-flight run gets to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = LostItemsConfig::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !config.enabled {
        tracing::info!("Lost-items service is disabled by configuration, exiting");
        return Ok(());
    }

    if let Some(addr) = &config.observability.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid metrics address {addr}"))?;
        MetricsServer::new(addr)
            .start()
            .context("Failed to start metrics exporter")?;
    } else {
        register_metrics();
    }

    let catalog = Arc::new(FolioClient::from_config(&config.folio));
    catalog
        .login()
        .await
        .context("Failed to log in to FOLIO")?;
    tracing::info!(
        okapi = %config.folio.okapi_base_url,
        tenant = %config.folio.tenant_id,
        "FOLIO connection ready"
    );

    let workflow = Arc::new(WorkflowHttpClient::from_config(&config.workflow_server));
    let engine = Arc::new(LifecycleEngine::new(catalog, workflow, &config, Arc::new(SystemClock)).await);

    let scheduler = start_scheduler(&config, engine)?;
    tracing::info!(
        new_lost_items = %config.schedule.new_lost_items,
        workflow_decisions = %config.schedule.workflow_decisions,
        triggers = scheduler.trigger_count(),
        "Lost-items service running, press Ctrl+C to stop"
    );

    signal::shutdown_signal().await;

    tracing::info!("Shutting down gracefully...");
    scheduler.shutdown().await;
    Ok(())
}

/// Put both pipelines of `engine` on their configured schedules.
fn start_scheduler<C, W>(config: &LostItemsConfig, engine: Arc<LifecycleEngine<C, W>>) -> anyhow::Result<Scheduler>
where
    C: CatalogClient + 'static,
    W: WorkflowClient + 'static,
{
    let new_lost_items = config.schedule.new_lost_items_schedule()?;
    let workflow_decisions = config.schedule.workflow_decisions_schedule()?;
    let mut scheduler = Scheduler::new(SHUTDOWN_GRACE);
    schedule_engine(&mut scheduler, engine, new_lost_items, workflow_decisions);
    Ok(scheduler)
}

//! Cron-driven triggers with graceful shutdown.
//!
//! Each trigger gets a loop task that sleeps until the next fire time of its
//! cron schedule and then starts a run in its own task, guarded by a
//! [`SingleFlight`]. A fire time that arrives while the previous run is still
//! going is skipped.
//!
//! [`Scheduler::shutdown`] broadcasts a stop signal: loops stop waiting, and
//! runs already in flight get a grace period to finish before they are
//! aborted.

use crate::engine::LifecycleEngine;
use crate::single_flight::{SingleFlight, Trigger};
use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::future::join_all;
use lost_items_core::environment::{CatalogClient, WorkflowClient};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

/// Owns the trigger loops.
pub struct Scheduler {
    shutdown_tx: broadcast::Sender<()>,
    grace: Duration,
    loops: Vec<(Trigger, JoinHandle<()>)>,
}

impl Scheduler {
    /// Create a scheduler whose in-flight runs get `grace` to finish on shutdown.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            shutdown_tx,
            grace,
            loops: Vec::new(),
        }
    }

    /// Receiver notified when shutdown starts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Number of trigger loops started.
    #[must_use]
    pub fn trigger_count(&self) -> usize {
        self.loops.len()
    }

    /// Start a loop that runs `job` at every fire time of `schedule`.
    pub fn spawn<F, Fut>(&mut self, trigger: Trigger, schedule: Schedule, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown_tx.subscribe();
        let grace = self.grace;
        let handle = tokio::spawn(trigger_loop(trigger, schedule, job, shutdown, grace));
        tracing::info!(%trigger, "Started trigger");
        self.loops.push((trigger, handle));
    }

    /// Stop every loop and wait for in-flight runs within the grace period.
    pub async fn shutdown(self) {
        tracing::info!(
            "Initiating graceful shutdown for {} triggers (grace: {:?})",
            self.loops.len(),
            self.grace
        );
        if let Err(e) = self.shutdown_tx.send(()) {
            tracing::warn!("No active shutdown signal receivers: {}", e);
        }

        let (triggers, handles): (Vec<_>, Vec<_>) = self.loops.into_iter().unzip();
        for (trigger, result) in triggers.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                tracing::error!(%trigger, "Trigger loop ended abnormally: {}", e);
            }
        }
        tracing::info!("All triggers stopped");
    }
}

/// Wire both engine pipelines to their schedules.
pub fn schedule_engine<C, W>(
    scheduler: &mut Scheduler,
    engine: Arc<LifecycleEngine<C, W>>,
    new_lost_items: Schedule,
    workflow_decisions: Schedule,
) where
    C: CatalogClient + 'static,
    W: WorkflowClient + 'static,
{
    let discovery = Arc::clone(&engine);
    scheduler.spawn(Trigger::NewLostItems, new_lost_items, move || {
        let engine = Arc::clone(&discovery);
        async move {
            match engine.discovery_run().await {
                Ok(report) => tracing::info!(?report, "Discovery run finished"),
                Err(error) => tracing::error!(%error, "Discovery run aborted"),
            }
        }
    });

    scheduler.spawn(Trigger::WorkflowDecisions, workflow_decisions, move || {
        let engine = Arc::clone(&engine);
        async move {
            match engine.reconciliation_run().await {
                Ok(report) => tracing::info!(?report, "Reconciliation run finished"),
                Err(error) => tracing::error!(%error, "Reconciliation run aborted"),
            }
        }
    });
}

async fn trigger_loop<F, Fut>(
    trigger: Trigger,
    schedule: Schedule,
    job: F,
    mut shutdown: broadcast::Receiver<()>,
    grace: Duration,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let flight = SingleFlight::new(trigger);
    let mut in_flight = JoinSet::new();
    let mut last_fire: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        let from = last_fire.map_or(now, |last| last.max(now));
        let Some(next) = schedule.after(&from).next() else {
            tracing::warn!(%trigger, "Schedule has no upcoming fire time");
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(%trigger, %next, "Waiting for next run");

        tokio::select! {
            _ = shutdown.recv() => break,
            () = tokio::time::sleep(wait) => {},
        }
        last_fire = Some(next);

        // Reap finished runs so the set does not grow.
        while in_flight.try_join_next().is_some() {}

        if let Some(guard) = flight.try_begin() {
            tracing::debug!(%trigger, "Schedule triggered");
            let run = job();
            in_flight.spawn(async move {
                run.await;
                drop(guard);
            });
        }
    }

    if !in_flight.is_empty() {
        tracing::info!(%trigger, "Waiting for in-flight run to finish");
        let drained = tokio::time::timeout(grace, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::error!(%trigger, "In-flight run did not finish within {:?}, aborting", grace);
            in_flight.abort_all();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_shutdown_interrupts_waiting_loop() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        // Once a year: the loop is parked in its sleep when we stop it.
        let schedule = Schedule::from_str("0 0 0 1 1 *").unwrap();
        scheduler.spawn(Trigger::NewLostItems, schedule, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(scheduler.trigger_count(), 1);

        tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_every_second_schedule_runs_job() {
        let mut scheduler = Scheduler::new(Duration::from_secs(1));
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let schedule = Schedule::from_str("* * * * * *").unwrap();
        scheduler.spawn(Trigger::WorkflowDecisions, schedule, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scheduler.shutdown().await;
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_slow_run_suppresses_overlapping_fires() {
        let mut scheduler = Scheduler::new(Duration::from_secs(5));
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let schedule = Schedule::from_str("* * * * * *").unwrap();
        scheduler.spawn(Trigger::NewLostItems, schedule, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(3_500)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(3_200)).await;
        scheduler.shutdown().await;
        // At least two fire times passed while the first run was still busy.
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }
}

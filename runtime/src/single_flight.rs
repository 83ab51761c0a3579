//! Per-trigger mutual exclusion.
//!
//! Two runs of the same trigger would race on the same holding and instance
//! suppression flags, and catalog writes carry no version check. A
//! [`SingleFlight`] lets at most one run of its trigger proceed; a run that
//! would overlap is skipped, not queued.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The two scheduled triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Discover new lost items and submit them.
    NewLostItems,
    /// Reconcile workflow decisions.
    WorkflowDecisions,
}

impl Trigger {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewLostItems => "new_lost_items",
            Self::WorkflowDecisions => "workflow_decisions",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Held for the duration of a run; dropping it lets the next run start.
#[derive(Debug)]
pub struct FlightGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Admits one run of a trigger at a time.
#[derive(Debug, Clone)]
pub struct SingleFlight {
    trigger: Trigger,
    lock: Arc<Mutex<()>>,
}

impl SingleFlight {
    /// Create a guard for `trigger`.
    #[must_use]
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// The guarded trigger.
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Whether a run is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Claim the trigger, or record a skipped run if it is busy.
    #[must_use]
    pub fn try_begin(&self) -> Option<FlightGuard> {
        if let Ok(guard) = Arc::clone(&self.lock).try_lock_owned() {
            Some(FlightGuard { _guard: guard })
        } else {
            tracing::warn!(trigger = %self.trigger, "Previous run still active, skipping");
            metrics::counter!("lost_items_runs_skipped_total", "trigger" => self.trigger.as_str())
                .increment(1);
            None
        }
    }

    /// Run `job` unless another run holds the trigger; `None` if skipped.
    pub async fn run<F: Future>(&self, job: F) -> Option<F::Output> {
        let _guard = self.try_begin()?;
        Some(job.await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_second_claim_is_refused_until_release() {
        let flight = SingleFlight::new(Trigger::NewLostItems);

        let first = flight.try_begin();
        assert!(first.is_some());
        assert!(flight.is_running());
        assert!(flight.try_begin().is_none());

        drop(first);
        assert!(!flight.is_running());
        assert!(flight.try_begin().is_some());
    }

    #[test]
    fn test_clones_share_the_lock() {
        let flight = SingleFlight::new(Trigger::WorkflowDecisions);
        let other = flight.clone();
        let _guard = flight.try_begin().unwrap();
        assert!(other.try_begin().is_none());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let flight = SingleFlight::new(Trigger::WorkflowDecisions);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let running = {
            let flight = flight.clone();
            tokio::spawn(async move {
                flight
                    .run(async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        "first"
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert_eq!(flight.run(async { "second" }).await, None);

        release_tx.send(()).unwrap();
        assert_eq!(running.await.unwrap(), Some("first"));
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), flight.run(async { "third" }))
                .await
                .unwrap(),
            Some("third")
        );
    }
}

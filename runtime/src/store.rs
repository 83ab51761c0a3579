//! Effect execution for the lifecycle reducer.
//!
//! The [`ItemStore`] owns the reducer and its environment. `send` reduces an
//! action, then executes the returned effects strictly in order; a
//! `ReloadItem` effect produces a `Reloaded` action that goes through the same
//! loop before any later effect runs.

use crate::cascade::{CascadeOutcome, SuppressionCascade};
use crate::gateway::{CatalogGateway, item_path};
use lost_items_core::effect::Effect;
use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{LifecycleError, Result};
use lost_items_core::lifecycle::{LifecycleAction, LifecycleEnvironment, LifecycleReducer, LostItem};
use lost_items_core::model::CatalogRecord;
use lost_items_core::reducer::Reducer;
use std::collections::VecDeque;

/// What executing one action (and everything it triggered) did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Item writes accepted by the catalog.
    pub writes: usize,
    /// Result of the suppression cascade, if one ran.
    pub cascade: Option<CascadeOutcome>,
}

/// Runs [`LifecycleReducer`] and executes its effects against the catalog.
pub struct ItemStore<C> {
    reducer: LifecycleReducer,
    env: LifecycleEnvironment,
    gateway: CatalogGateway<C>,
    cascade: SuppressionCascade<C>,
}

impl<C: CatalogClient> ItemStore<C> {
    /// Create a store.
    #[must_use]
    pub const fn new(
        env: LifecycleEnvironment,
        gateway: CatalogGateway<C>,
        cascade: SuppressionCascade<C>,
    ) -> Self {
        Self {
            reducer: LifecycleReducer,
            env,
            gateway,
            cascade,
        }
    }

    /// Lifecycle environment shared with callers building actions.
    #[must_use]
    pub const fn environment(&self) -> &LifecycleEnvironment {
        &self.env
    }

    /// Reduce `action` against `item` and execute the resulting effects.
    ///
    /// Stops at the first failing effect; the item's in-memory phase then
    /// reflects what was attempted, not what the catalog holds.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::WriteRejected`] when the catalog refuses an
    /// update, or any catalog error raised by a fetch or the cascade.
    pub async fn send(&self, item: &mut LostItem, action: LifecycleAction) -> Result<SendReport> {
        let mut report = SendReport::default();
        let mut actions = VecDeque::from([action]);

        while let Some(action) = actions.pop_front() {
            let effects = self.reducer.reduce(item, action, &self.env);
            tracing::trace!("Reducer returned {} effects", effects.len());

            for effect in effects {
                match effect {
                    Effect::PutItem => {
                        self.put_item(item).await?;
                        report.writes += 1;
                    },
                    Effect::ReloadItem { item_id } => {
                        let record = self.gateway.item(&item_id).await?;
                        actions.push_back(LifecycleAction::Reloaded(record));
                    },
                    Effect::CascadeSuppression { holdings_record_id } => {
                        report.cascade = Some(self.cascade.run(&holdings_record_id).await?);
                    },
                }
            }
        }

        Ok(report)
    }

    async fn put_item(&self, item: &LostItem) -> Result<()> {
        let id = item.record.id().unwrap_or_default();
        if self.gateway.put_item(&item.record).await? {
            tracing::debug!(item_id = %id, phase = ?item.phase, "Updated item");
            Ok(())
        } else {
            Err(LifecycleError::WriteRejected { path: item_path(id) })
        }
    }
}

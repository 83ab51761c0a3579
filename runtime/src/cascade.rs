//! Upward discovery suppression: item → holding → instance.
//!
//! A holding is hidden only once every item under it is hidden, and an
//! instance only once every holding under it is. A record whose flag is absent
//! counts as visible. Nothing here ever clears a suppression flag.

use crate::gateway::{CatalogGateway, holding_path, instance_path};
use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{LifecycleError, ParseError, Result};
use lost_items_core::model::{CatalogRecord, HoldingRecord};

/// How far a cascade got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// The holding still has visible items, or was already hidden.
    Unchanged,
    /// The holding was hidden; its instance still has visible holdings.
    HoldingSuppressed,
    /// Both the holding and its instance were hidden.
    InstanceSuppressed,
}

/// Runs the suppression cascade against the catalog.
pub struct SuppressionCascade<C> {
    gateway: CatalogGateway<C>,
    withdrawn_instance_status_id: Option<String>,
}

impl<C: CatalogClient> SuppressionCascade<C> {
    /// Create a cascade; `withdrawn_instance_status_id` is stamped on
    /// instances it hides, when configured.
    #[must_use]
    pub const fn new(gateway: CatalogGateway<C>, withdrawn_instance_status_id: Option<String>) -> Self {
        Self {
            gateway,
            withdrawn_instance_status_id,
        }
    }

    /// Check the holding of a just-withdrawn item, then its instance.
    ///
    /// # Errors
    ///
    /// Returns catalog and decode errors, and [`LifecycleError::WriteRejected`]
    /// when a holding or instance update is refused. A refused holding update
    /// stops the cascade before the instance is looked at.
    pub async fn run(&self, holdings_record_id: &str) -> Result<CascadeOutcome> {
        let items = self.gateway.items_in_holding(holdings_record_id).await?;
        if let Some(visible) = items.iter().find(|item| !item.is_suppressed()) {
            tracing::debug!(
                holdings_record_id,
                visible_item = visible.id().unwrap_or("-"),
                "Holding still has visible items"
            );
            return Ok(CascadeOutcome::Unchanged);
        }

        let mut holding = self.gateway.holding(holdings_record_id).await?;
        if holding.is_suppressed() {
            tracing::debug!(holdings_record_id, "Holding already suppressed");
            return Ok(CascadeOutcome::Unchanged);
        }
        holding.suppress();
        if !self.gateway.put_holding(&holding).await? {
            return Err(LifecycleError::WriteRejected {
                path: holding_path(holdings_record_id),
            });
        }
        tracing::info!(holdings_record_id, "Suppressed holding");
        metrics::counter!("lost_items_suppressed_total", "level" => "holding").increment(1);

        self.suppress_instance_if_hidden(&holding).await
    }

    async fn suppress_instance_if_hidden(&self, holding: &HoldingRecord) -> Result<CascadeOutcome> {
        let instance_id = holding.instance_id().ok_or(LifecycleError::Malformed {
            record: HoldingRecord::KIND,
            source: ParseError::MissingField("instanceId"),
        })?;

        let holdings = self.gateway.holdings_of_instance(instance_id).await?;
        // The listing may predate our own write; the holding we just hid counts as hidden.
        let visible = holdings
            .iter()
            .filter(|h| h.id() != holding.id())
            .find(|h| !h.is_suppressed());
        if let Some(visible) = visible {
            tracing::debug!(
                instance_id,
                visible_holding = visible.id().unwrap_or("-"),
                "Instance still has visible holdings"
            );
            return Ok(CascadeOutcome::HoldingSuppressed);
        }

        let mut instance = self.gateway.instance(instance_id).await?;
        if instance.is_suppressed() {
            tracing::debug!(instance_id, "Instance already suppressed");
            return Ok(CascadeOutcome::HoldingSuppressed);
        }
        instance.suppress();
        if let Some(status_id) = &self.withdrawn_instance_status_id {
            instance.set_status_id(status_id);
        }
        if !self.gateway.put_instance(&instance).await? {
            return Err(LifecycleError::WriteRejected {
                path: instance_path(instance_id),
            });
        }
        tracing::info!(instance_id, "Suppressed instance");
        metrics::counter!("lost_items_suppressed_total", "level" => "instance").increment(1);

        Ok(CascadeOutcome::InstanceSuppressed)
    }
}

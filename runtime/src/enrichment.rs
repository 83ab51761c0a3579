//! Context lines appended to a purchase request before submission.
//!
//! Each stage runs on its own; a stage that fails is logged and skipped, and
//! the request goes out with whatever the other stages produced.

use crate::gateway::CatalogGateway;
use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{LifecycleError, ParseError, Result};
use lost_items_core::model::{ItemRecord, PurchaseRequest};
use lost_items_core::notes::{NoteChannel, NoteKind};
use serde_json::Value;
use std::collections::HashMap;

/// Line added to items carrying the damaged-beyond-repair code.
pub const DAMAGED_LINE: &str = "Damaged beyond repair.";

/// Retention-agreement statistical codes, id → display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionTable {
    names: HashMap<String, String>,
}

impl RetentionTable {
    /// Build from raw statistical-code records; records without an id or
    /// name are ignored.
    #[must_use]
    pub fn from_codes(codes: &[Value]) -> Self {
        let names = codes
            .iter()
            .filter_map(|code| {
                let id = code.get("id")?.as_str()?;
                let name = code.get("name")?.as_str()?;
                Some((id.to_string(), name.to_string()))
            })
            .collect();
        Self { names }
    }

    /// Load every code of `code_type_id` from the catalog.
    ///
    /// Never fails: without a code type, or when the lookup fails, the table
    /// is empty and the failure is logged.
    pub async fn load<C: CatalogClient>(gateway: &CatalogGateway<C>, code_type_id: Option<&str>) -> Self {
        let Some(code_type_id) = code_type_id else {
            tracing::debug!("No retention agreement code type configured");
            return Self::default();
        };
        match gateway.statistical_codes(code_type_id).await {
            Ok(codes) => {
                let table = Self::from_codes(&codes);
                tracing::info!(count = table.len(), "Loaded retention agreement codes");
                table
            },
            Err(error) => {
                tracing::error!(%error, code_type_id, "Could not load retention agreement codes");
                Self::default()
            },
        }
    }

    /// Display name of a retention code.
    #[must_use]
    pub fn name(&self, code_id: &str) -> Option<&str> {
        self.names.get(code_id).map(String::as_str)
    }

    /// Number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no codes are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Enrichment stages that can fail independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Circulation-log checkout count.
    Usage,
    /// Holding → instance lookup.
    Instance,
}

/// Appends usage, retention, damage and instance context to requests.
pub struct Enricher<C> {
    gateway: CatalogGateway<C>,
    retention: RetentionTable,
    damaged_code: Option<String>,
    notes: NoteChannel,
}

impl<C: CatalogClient> Enricher<C> {
    /// Create an enricher.
    #[must_use]
    pub const fn new(
        gateway: CatalogGateway<C>,
        retention: RetentionTable,
        damaged_code: Option<String>,
        notes: NoteChannel,
    ) -> Self {
        Self {
            gateway,
            retention,
            damaged_code,
            notes,
        }
    }

    /// The retention table in use.
    #[must_use]
    pub const fn retention(&self) -> &RetentionTable {
        &self.retention
    }

    /// Run every stage against the catalog item carried by `request`.
    ///
    /// Returns the stages that failed; their lines are simply missing.
    pub async fn enrich(&self, request: &mut PurchaseRequest) -> Vec<Stage> {
        let Some(item) = request.existing_folio_item.clone() else {
            tracing::warn!("Purchase request carries no catalog item, skipping enrichment");
            return Vec::new();
        };
        let mut failed = Vec::new();

        match self.usage_line(&item).await {
            Ok(line) => request.append_comment(&line),
            Err(error) => {
                tracing::warn!(%error, item_id = ?request.existing_folio_item_id, "Usage enrichment failed");
                failed.push(Stage::Usage);
            },
        }

        if let Some(line) = self.legacy_usage_line(&item) {
            request.append_comment(&line);
        }

        for line in self.retention_lines(&item) {
            request.append_comment(&line);
        }

        if let Some(line) = self.damage_line(&item) {
            request.append_comment(line);
        }

        if let Err(error) = self.apply_instance_context(&item, request).await {
            tracing::warn!(%error, item_id = ?request.existing_folio_item_id, "Instance enrichment failed");
            failed.push(Stage::Instance);
        }

        failed
    }

    async fn usage_line(&self, item: &ItemRecord) -> Result<String> {
        let barcode = item.barcode().ok_or(LifecycleError::Malformed {
            record: "item",
            source: ParseError::MissingField("barcode"),
        })?;
        let checkouts = self.gateway.checkout_count(barcode).await?;
        Ok(format!("Checkouts: {checkouts}."))
    }

    /// Checkout count carried over from the previous system, when a note
    /// type for it is configured.
    #[must_use]
    pub fn legacy_usage_line(&self, item: &ItemRecord) -> Option<String> {
        self.notes.type_id(NoteKind::LegacyUsage)?;
        let legacy = self.notes.read(item, NoteKind::LegacyUsage).unwrap_or("not found");
        Some(format!("Legacy checkouts: {legacy}."))
    }

    /// One line per retention-agreement code on the item.
    #[must_use]
    pub fn retention_lines(&self, item: &ItemRecord) -> Vec<String> {
        item.statistical_code_ids()
            .filter_map(|code| self.retention.name(code))
            .map(|name| format!("Note Retention Agreement: {name}."))
            .collect()
    }

    /// Damage marker, if the item carries the configured code.
    #[must_use]
    pub fn damage_line(&self, item: &ItemRecord) -> Option<&'static str> {
        self.damaged_code
            .as_deref()
            .filter(|code| item.has_statistical_code(code))
            .map(|_| DAMAGED_LINE)
    }

    async fn apply_instance_context(&self, item: &ItemRecord, request: &mut PurchaseRequest) -> Result<()> {
        let holdings_record_id = item.holdings_record_id().ok_or(LifecycleError::Malformed {
            record: "item",
            source: ParseError::MissingField("holdingsRecordId"),
        })?;
        let holding = self.gateway.holding(holdings_record_id).await?;
        let instance_id = holding.instance_id().ok_or(LifecycleError::Malformed {
            record: "holding",
            source: ParseError::MissingField("instanceId"),
        })?;
        let instance = self.gateway.instance(instance_id).await?;

        if let Some(hrid) = instance.hrid() {
            request.append_comment(&format!("Instance HRID: {hrid}."));
        }
        if let Some(index_title) = instance.index_title() {
            tracing::debug!(index_title, "Using instance index title");
            request.title = Some(index_title.to_string());
        }
        Ok(())
    }
}

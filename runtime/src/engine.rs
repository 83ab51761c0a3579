//! The two scheduled pipelines.
//!
//! - **Discovery** finds new lost or damaged items, enriches and submits them
//!   to the workflow, tags them with the correlation pair and withdraws them.
//! - **Reconciliation** looks up the decision for every tagged item and
//!   applies it.
//!
//! Failure policy differs between the two. Discovery skips items that fail
//! before the workflow accepted them, but any failure after the correlation
//! pair has been applied ends the run. Reconciliation logs per-item failures
//! and moves on.

use crate::cascade::SuppressionCascade;
use crate::enrichment::{Enricher, RetentionTable};
use crate::gateway::CatalogGateway;
use crate::store::ItemStore;
use lost_items_core::config::LostItemsConfig;
use lost_items_core::environment::{CatalogClient, Clock, WorkflowClient};
use lost_items_core::error::Result;
use lost_items_core::lifecycle::{Decision, LifecycleAction, LifecycleEnvironment, LostItem};
use lost_items_core::mapper::RecordMapper;
use lost_items_core::model::{CatalogRecord, ItemRecord, PurchaseRequest};
use lost_items_core::query::QueryBuilder;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

/// Tally of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Items returned by the discovery search.
    pub candidates: usize,
    /// Items that could not be parsed.
    pub unparseable: usize,
    /// Requests the workflow accepted.
    pub submitted: usize,
    /// Requests the workflow refused or that failed in transit.
    pub submission_failures: usize,
    /// Requests the workflow accepted without returning a key. The item
    /// stays untagged and is submitted again by the next run.
    pub keyless_submissions: usize,
    /// Items withdrawn after submission.
    pub withdrawn: usize,
    /// Whether the run did nothing because no selection is configured.
    pub skipped: bool,
}

/// Tally of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Items currently tagged as in the workflow.
    pub candidates: usize,
    /// Items that could not be parsed or carry no correlation key.
    pub unparseable: usize,
    /// Approved decisions applied.
    pub approved: usize,
    /// Denied decisions applied.
    pub denied: usize,
    /// Requests still awaiting a decision.
    pub pending: usize,
    /// Keys the workflow does not know.
    pub not_found: usize,
    /// Items whose lookup or update failed.
    pub failures: usize,
}

enum ReconcileOutcome {
    Decided(Decision),
    Pending,
    NotFound,
}

/// Drives both pipelines against one catalog and one workflow service.
pub struct LifecycleEngine<C, W> {
    gateway: CatalogGateway<C>,
    workflow: Arc<W>,
    queries: QueryBuilder,
    mapper: RecordMapper,
    enricher: Enricher<C>,
    store: ItemStore<C>,
    discovery_limit: Option<usize>,
    reconciliation_limit: Option<usize>,
    approved_status: String,
    denied_status: String,
}

impl<C: CatalogClient, W: WorkflowClient> LifecycleEngine<C, W> {
    /// Build an engine from configuration.
    ///
    /// Loads the retention-agreement table once; a failed load leaves it empty.
    pub async fn new(
        catalog: Arc<C>,
        workflow: Arc<W>,
        config: &LostItemsConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let folio = &config.folio;
        let gateway = CatalogGateway::new(catalog);
        let rules = config.lifecycle_rules();
        let notes = rules.notes.clone();

        let retention = RetentionTable::load(
            &gateway,
            folio.statistical_code_type_retention_agreement.as_deref(),
        )
        .await;
        let enricher = Enricher::new(
            gateway.clone(),
            retention,
            folio.damaged_beyond_repair_code.clone(),
            notes.clone(),
        );
        let cascade = SuppressionCascade::new(gateway.clone(), folio.withdrawn_instance_status_id.clone());
        let store = ItemStore::new(LifecycleEnvironment::new(rules, clock), gateway.clone(), cascade);

        Self {
            gateway,
            workflow,
            queries: QueryBuilder::new(config.discovery_criteria()),
            mapper: RecordMapper::new(notes),
            enricher,
            store,
            discovery_limit: folio.new_lost_items_limit,
            reconciliation_limit: folio.workflow_items_limit,
            approved_status: config.workflow_server.approved_status.clone(),
            denied_status: config.workflow_server.denied_status.clone(),
        }
    }

    /// The enricher, exposing the loaded retention table.
    #[must_use]
    pub const fn enricher(&self) -> &Enricher<C> {
        &self.enricher
    }

    /// Find new lost items and push them into the workflow.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the discovery search, or of any catalog
    /// step after the workflow accepted a request. Items processed before the
    /// failure keep their updates; later candidates wait for the next run.
    pub async fn discovery_run(&self) -> Result<DiscoveryReport> {
        self.discover().instrument(tracing::info_span!("discovery_run")).await
    }

    /// Pull workflow decisions back into the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error only if the in-workflow search itself fails.
    pub async fn reconciliation_run(&self) -> Result<ReconciliationReport> {
        self.reconcile()
            .instrument(tracing::info_span!("reconciliation_run"))
            .await
    }

    async fn discover(&self) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        let Some(query) = self.queries.discovery() else {
            tracing::warn!("No lost statuses or damage code configured, skipping discovery");
            report.skipped = true;
            return Ok(report);
        };
        tracing::debug!(%query, "Searching for new lost items");

        let candidates = self.gateway.search_items(&query, self.discovery_limit).await?;
        report.candidates = candidates.len();
        tracing::info!(count = candidates.len(), "Found lost item candidates");

        for value in candidates {
            let Some((record, mut request)) = self.parse(value) else {
                report.unparseable += 1;
                continue;
            };
            metrics::counter!("lost_items_discovered_total").increment(1);

            let failed_stages = self.enricher.enrich(&mut request).await;
            if !failed_stages.is_empty() {
                tracing::debug!(?failed_stages, "Submitting with partial enrichment");
            }

            tracing::info!(%request, "Requesting replacement purchase");
            let key = match self.workflow.submit(&request).await {
                Ok(saved) => match saved.key.filter(|key| !key.is_empty()) {
                    Some(key) => key,
                    None => {
                        tracing::error!(
                            item_id = ?request.existing_folio_item_id,
                            request_id = ?saved.id,
                            "Workflow accepted the request without a key, item left untagged"
                        );
                        metrics::counter!("lost_items_keyless_submissions_total").increment(1);
                        report.keyless_submissions += 1;
                        continue;
                    },
                },
                Err(error) => {
                    tracing::warn!(%error, item_id = ?request.existing_folio_item_id, "Submission failed");
                    metrics::counter!("lost_items_submission_failures_total").increment(1);
                    report.submission_failures += 1;
                    continue;
                },
            };
            metrics::counter!("lost_items_submitted_total").increment(1);
            report.submitted += 1;

            let mut item = LostItem::discovered(record);
            self.store
                .send(&mut item, LifecycleAction::SubmissionAccepted { key: key.clone() })
                .await
                .inspect_err(|error| {
                    tracing::error!(%error, %key, "Catalog update failed after submission, ending run");
                })?;
            tracing::info!(%key, item_id = ?request.existing_folio_item_id, "Item submitted and withdrawn");
            report.withdrawn += 1;
        }

        Ok(report)
    }

    async fn reconcile(&self) -> Result<ReconciliationReport> {
        let mut report = ReconciliationReport::default();
        let query = self.queries.in_workflow();
        tracing::debug!(%query, "Searching for items in the workflow");

        let candidates = self
            .gateway
            .search_items(&query, self.reconciliation_limit)
            .await?;
        report.candidates = candidates.len();
        tracing::info!(count = candidates.len(), "Found items awaiting a decision");

        for value in candidates {
            let Some((_, request)) = self.parse(value) else {
                report.unparseable += 1;
                continue;
            };
            let Some(key) = request.key.clone() else {
                tracing::warn!(
                    item_id = ?request.existing_folio_item_id,
                    "Item is tagged in-workflow but has no correlation note, skipping"
                );
                report.unparseable += 1;
                continue;
            };

            match self.reconcile_item(&request, key.clone()).await {
                Ok(ReconcileOutcome::Decided(Decision::Approved)) => report.approved += 1,
                Ok(ReconcileOutcome::Decided(Decision::Denied)) => report.denied += 1,
                Ok(ReconcileOutcome::Pending) => {
                    tracing::debug!(%key, "No decision yet");
                    report.pending += 1;
                },
                Ok(ReconcileOutcome::NotFound) => {
                    tracing::warn!(%key, "Purchase request not found in workflow");
                    report.not_found += 1;
                },
                Err(error) => {
                    tracing::error!(%error, %key, "Reconciliation failed for item");
                    report.failures += 1;
                },
            }
        }

        Ok(report)
    }

    async fn reconcile_item(&self, request: &PurchaseRequest, key: String) -> Result<ReconcileOutcome> {
        let Some(saved) = self.workflow.get_by_key(&key).await? else {
            return Ok(ReconcileOutcome::NotFound);
        };
        let saved = saved.with_catalog_item_from(request);

        let decision = match saved.status.as_deref() {
            Some(status) if status == self.approved_status => Decision::Approved,
            Some(status) if status == self.denied_status => Decision::Denied,
            _ => return Ok(ReconcileOutcome::Pending),
        };
        let Some(record) = saved.existing_folio_item.clone() else {
            return Ok(ReconcileOutcome::Pending);
        };
        tracing::info!(%saved, decision = decision.as_str(), "Applying workflow decision");
        metrics::counter!("lost_items_decisions_total", "decision" => decision.as_str()).increment(1);

        let mut item = LostItem::in_workflow(record, key);
        self.store
            .send(
                &mut item,
                LifecycleAction::DecisionReceived {
                    decision,
                    update_date: saved.update_date,
                },
            )
            .await?;
        Ok(ReconcileOutcome::Decided(decision))
    }

    fn parse(&self, value: Value) -> Option<(ItemRecord, PurchaseRequest)> {
        let record = ItemRecord::from_value(value)
            .inspect_err(|error| tracing::warn!(%error, "Skipping non-object item payload"))
            .ok()?;
        let request = self
            .mapper
            .parse(&record)
            .inspect_err(|error| {
                tracing::warn!(%error, item_id = ?record.id(), "Skipping unparseable item");
            })
            .ok()?;
        Some((record, request))
    }
}

//! # Lost Items Core
//!
//! Domain types and rules for the lost-item replacement service.
//!
//! The service periodically finds lost or damaged items in the library
//! catalog, submits a replacement-purchase request for each to an external
//! workflow, and later reconciles the workflow's decision back into the
//! catalog, hiding emptied holdings and instances from discovery.
//!
//! This crate holds everything that does not perform I/O:
//!
//! - **Records**: raw catalog items, holdings and instances with typed access
//! - **Notes**: the note-type channel used as a key/value store on items
//! - **Queries**: CQL filters for the two catalog searches
//! - **Mapper**: catalog item → purchase request
//! - **Lifecycle**: the per-item state machine, as a [`reducer::Reducer`]
//! - **Environment**: the catalog, workflow and clock traits the runtime injects
//! - **Config**: the TOML configuration surface
//!
//! ## Example
//!
//! ```
//! use lost_items_core::query::{DiscoveryCriteria, QueryBuilder};
//!
//! let builder = QueryBuilder::new(DiscoveryCriteria {
//!     statuses: vec!["Lost".to_string()],
//!     damaged_code: None,
//!     patron_requesting_note_type: None,
//!     in_workflow_code: "in-workflow".to_string(),
//! });
//!
//! assert_eq!(builder.in_workflow().as_str(), r#"statisticalCodeIds=="in-workflow""#);
//! assert!(builder.discovery().is_some());
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mapper;
pub mod model;
pub mod notes;
pub mod paging;
pub mod query;

pub use chrono::{DateTime, Utc};
pub use error::{CatalogError, ConfigError, LifecycleError, ParseError, WorkflowError};
pub use model::{CatalogRecord, HoldingRecord, InstanceRecord, ItemRecord, PurchaseRequest};

/// Reducer module - pure state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain the business rules and are deterministic and testable without
/// a catalog or workflow service.
pub mod reducer {
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates state in place and returns the effects the runtime must
        /// execute, in order.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Vec<Effect>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe catalog writes to be performed by the runtime.
/// They are values, not execution.
pub mod effect {
    /// A catalog side effect requested by the lifecycle reducer.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Effect {
        /// Write the item's full record back to the catalog.
        PutItem,

        /// Fetch the item again; the result is fed back as
        /// [`LifecycleAction::Reloaded`](crate::lifecycle::LifecycleAction::Reloaded).
        ReloadItem {
            /// Item to fetch
            item_id: String,
        },

        /// Check whether the item's holding, and then its instance, should be
        /// hidden from discovery.
        CascadeSuppression {
            /// Holding of the withdrawn item
            holdings_record_id: String,
        },
    }
}

/// Environment module - Dependency injection traits
///
/// All external systems are abstracted behind traits and injected into the
/// runtime, so tests can run the whole lifecycle against in-memory doubles.
pub mod environment {
    use crate::error::{CatalogError, CatalogResult, WorkflowResult};
    use crate::model::PurchaseRequest;
    use crate::paging::PagePlan;
    use crate::query::CqlQuery;
    use chrono::{DateTime, Utc};
    use serde_json::Value;
    use std::future::Future;

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Authenticated access to the library catalog.
    pub trait CatalogClient: Send + Sync {
        /// GET a JSON object.
        ///
        /// # Errors
        ///
        /// Returns a [`CatalogError`] for transport failures, unexpected
        /// statuses or undecodable bodies.
        fn get(
            &self,
            path: &str,
            query: Option<&CqlQuery>,
            limit: Option<usize>,
            offset: Option<usize>,
        ) -> impl Future<Output = CatalogResult<Value>> + Send;

        /// PUT a full record.
        ///
        /// Returns `Ok(true)` only for an empty-body success; any other status is
        /// reported as `Ok(false)`.
        ///
        /// # Errors
        ///
        /// Returns a [`CatalogError`] when the request cannot be completed.
        fn put(&self, path: &str, body: &Value) -> impl Future<Output = CatalogResult<bool>> + Send;

        /// GET the records in `array_field` of a collection response.
        ///
        /// Fetches of more than [`BATCH_SIZE`](crate::paging::BATCH_SIZE)
        /// records are split into sequential pages, stopping at the first empty
        /// page. `limit: None` fetches everything.
        ///
        /// # Errors
        ///
        /// Returns the first page error, or [`CatalogError::DecodeFailed`] when a
        /// page lacks `array_field`.
        fn get_array(
            &self,
            path: &str,
            query: Option<&CqlQuery>,
            limit: Option<usize>,
            array_field: &str,
        ) -> impl Future<Output = CatalogResult<Vec<Value>>> + Send {
            async move {
                let mut plan = PagePlan::new(limit);
                let mut records = Vec::new();
                while let Some(page) = plan.next_page() {
                    let response = self
                        .get(path, query, Some(page.limit), Some(page.offset))
                        .await?;
                    let page_records = match response {
                        Value::Object(mut body) => match body.remove(array_field) {
                            Some(Value::Array(values)) => values,
                            _ => {
                                return Err(CatalogError::DecodeFailed(format!(
                                    "{path}: missing array `{array_field}`"
                                )));
                            },
                        },
                        _ => {
                            return Err(CatalogError::DecodeFailed(format!(
                                "{path}: response is not an object"
                            )));
                        },
                    };
                    plan.record(page, page_records.len());
                    records.extend(page_records);
                }
                Ok(records)
            }
        }
    }

    /// The external purchase-decision workflow.
    pub trait WorkflowClient: Send + Sync {
        /// Submit a new purchase request; the result carries the assigned key.
        ///
        /// # Errors
        ///
        /// Returns a [`WorkflowError`](crate::error::WorkflowError) when the
        /// request is not accepted.
        fn submit(
            &self,
            request: &PurchaseRequest,
        ) -> impl Future<Output = WorkflowResult<PurchaseRequest>> + Send;

        /// Look up a request by correlation key; `Ok(None)` if it does not exist.
        ///
        /// # Errors
        ///
        /// Returns a [`WorkflowError`](crate::error::WorkflowError) for any
        /// failure other than not-found.
        fn get_by_key(
            &self,
            key: &str,
        ) -> impl Future<Output = WorkflowResult<Option<PurchaseRequest>>> + Send;
    }
}

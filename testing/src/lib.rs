//! # Lost Items Testing
//!
//! Testing utilities and helpers for the lost-items service.
//!
//! This crate provides:
//! - In-memory implementations of the environment traits
//! - Catalog record and configuration fixtures
//! - Property-based testing strategies
//! - A Given/When/Then helper for the lifecycle reducer
//!
//! ## Example
//!
//! ```ignore
//! use lost_items_testing::{InMemoryCatalog, ScriptedWorkflow, fixtures, test_clock};
//!
//! #[tokio::test]
//! async fn test_denial_withdraws_item() {
//!     let catalog = Arc::new(InMemoryCatalog::new());
//!     catalog.insert_item(fixtures::item("i1", "h1"));
//!     let workflow = Arc::new(ScriptedWorkflow::new());
//!
//!     let engine = LifecycleEngine::new(catalog.clone(), workflow, &fixtures::config(), Arc::new(test_clock())).await;
//!     engine.reconciliation_run().await.unwrap();
//! }
//! ```

use chrono::{DateTime, Utc};
use lost_items_core::environment::Clock;

mod catalog;
mod workflow;


pub use catalog::{InMemoryCatalog, RecordedGet};
pub use reducer_test::ReducerTest;
pub use workflow::ScriptedWorkflow;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    pub use crate::catalog::InMemoryCatalog;
    pub use crate::workflow::ScriptedWorkflow;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use lost_items_testing::mocks::FixedClock;
    /// use lost_items_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Catalog records and configuration shared by tests.
pub mod fixtures {
    use lost_items_core::config::LostItemsConfig;
    use serde_json::{Value, json};

    /// In-workflow statistical code.
    pub const IN_WORKFLOW_CODE: &str = "sc-in-workflow";
    /// Damaged-beyond-repair statistical code.
    pub const DAMAGED_CODE: &str = "sc-damaged";
    /// Retention-agreement statistical code type.
    pub const RETENTION_CODE_TYPE: &str = "sct-retention";
    /// Correlation note type.
    pub const CORRELATION_NOTE: &str = "nt-correlation";
    /// Decision comment note type.
    pub const COMMENT_NOTE: &str = "nt-comment";
    /// Patron-requesting note type.
    pub const PATRON_NOTE: &str = "nt-patron";
    /// Legacy checkout count note type.
    pub const LEGACY_NOTE: &str = "nt-legacy";
    /// Instance status set on suppressed instances.
    pub const WITHDRAWN_INSTANCE_STATUS: &str = "is-withdrawn";

    /// A lost, visible item under `holdings_record_id`.
    #[must_use]
    pub fn item(id: &str, holdings_record_id: &str) -> Value {
        json!({
            "id": id,
            "hrid": format!("it-{id}"),
            "holdingsRecordId": holdings_record_id,
            "title": format!("Title of {id}"),
            "barcode": format!("bc-{id}"),
            "contributorNames": [{"name": "Author, Some"}],
            "callNumber": "QA76.73 .R87",
            "status": {"name": "Declared lost", "date": "2024-11-02T09:00:00.000+00:00"},
            "discoverySuppress": false,
            "statisticalCodeIds": [],
            "notes": [],
            "circulationNotes": [],
            "metadata": {"createdDate": "2020-01-01T00:00:00.000+00:00"},
        })
    }

    /// An item already tagged as awaiting workflow decision `key`.
    #[must_use]
    pub fn item_in_workflow(id: &str, holdings_record_id: &str, key: &str) -> Value {
        let mut item = item(id, holdings_record_id);
        item["statisticalCodeIds"] = json!([IN_WORKFLOW_CODE]);
        item["notes"] = json!([
            {"itemNoteTypeId": CORRELATION_NOTE, "note": key, "staffOnly": true}
        ]);
        item
    }

    /// A copy of `record` with its suppression flag set.
    #[must_use]
    pub fn suppressed(mut record: Value) -> Value {
        record["discoverySuppress"] = Value::Bool(true);
        record
    }

    /// A visible holding under `instance_id`.
    #[must_use]
    pub fn holding(id: &str, instance_id: &str) -> Value {
        json!({
            "id": id,
            "instanceId": instance_id,
            "permanentLocationId": "loc-main",
            "discoverySuppress": false,
        })
    }

    /// A visible instance.
    #[must_use]
    pub fn instance(id: &str) -> Value {
        json!({
            "id": id,
            "hrid": format!("in-{id}"),
            "title": format!("Instance {id}"),
            "indexTitle": format!("Index title {id}"),
            "statusId": "is-cataloged",
            "discoverySuppress": false,
        })
    }

    /// Configuration TOML using the fixture identifiers.
    #[must_use]
    pub fn config_toml() -> String {
        format!(
            r#"
            [schedule]
            new_lost_items = "0 0 2 * * *"
            workflow_decisions = "0 */15 * * * *"

            [folio]
            okapi_base_url = "http://okapi.test"
            tenant_id = "test"
            username = "svc"
            password = "pw"
            new_lost_items_statuses = ["Declared lost", "Aged to lost"]
            damaged_beyond_repair_code = "{DAMAGED_CODE}"
            statistical_code_in_workflow = "{IN_WORKFLOW_CODE}"
            statistical_code_type_retention_agreement = "{RETENTION_CODE_TYPE}"
            withdrawn_instance_status_id = "{WITHDRAWN_INSTANCE_STATUS}"

            [folio.item_notes]
            lost_item_workflow_tag = "{CORRELATION_NOTE}"
            lost_item_workflow_comment = "{COMMENT_NOTE}"
            lost_item_workflow_patron_requesting = "{PATRON_NOTE}"
            legacy_checkouts = "{LEGACY_NOTE}"

            [workflow_server]
            base_url = "http://workflow.test"
            username = "svc"
            password = "pw"
            approved_status = "Approved"
            denied_status = "Denied"
            "#
        )
    }

    /// Parsed configuration using the fixture identifiers.
    ///
    /// # Panics
    ///
    /// Panics if the fixture document does not parse, which would be a bug
    /// in this crate.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn config() -> LostItemsConfig {
        LostItemsConfig::from_toml_str(&config_toml()).expect("fixture configuration should parse")
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use crate::fixtures;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    /// A note of one of the fixture note types, or of an unrelated type.
    pub fn note() -> impl Strategy<Value = Value> {
        let note_type = prop_oneof![
            Just(fixtures::CORRELATION_NOTE),
            Just(fixtures::COMMENT_NOTE),
            Just(fixtures::PATRON_NOTE),
            Just("nt-unrelated"),
        ];
        (note_type, "[A-Za-z0-9-]{1,12}").prop_map(|(note_type, text)| {
            json!({"itemNoteTypeId": note_type, "note": text, "staffOnly": true})
        })
    }

    /// A fixture item whose notes may already hold duplicate correlation notes.
    pub fn item_with_noisy_notes() -> impl Strategy<Value = Value> {
        prop::collection::vec(note(), 0..8).prop_map(|notes| {
            let mut item = fixtures::item("i-prop", "h-prop");
            item["notes"] = Value::Array(notes);
            item
        })
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

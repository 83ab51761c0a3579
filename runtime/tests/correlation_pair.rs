//! The correlation code and note travel together whatever notes an item
//! already carries.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use lost_items_runtime::LifecycleEngine;
use lost_items_testing::fixtures::{self, CORRELATION_NOTE, IN_WORKFLOW_CODE};
use lost_items_testing::{InMemoryCatalog, ScriptedWorkflow, properties, test_clock};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

fn correlation_notes(item: &Value) -> Vec<String> {
    item["notes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["itemNoteTypeId"] == CORRELATION_NOTE)
        .map(|n| n["note"].as_str().unwrap().to_string())
        .collect()
}

fn has_in_workflow_code(item: &Value) -> bool {
    item["statisticalCodeIds"]
        .as_array()
        .unwrap()
        .contains(&json!(IN_WORKFLOW_CODE))
}

/// Run discovery then reconciliation with a denial, returning the item after
/// each run.
async fn submit_then_deny(item: Value) -> (Value, Value) {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_instance(fixtures::instance("n-prop"));
    catalog.insert_holding(fixtures::holding("h-prop", "n-prop"));
    catalog.insert_item(item);
    let workflow = Arc::new(ScriptedWorkflow::new());
    let config = fixtures::config();

    let engine = LifecycleEngine::new(
        Arc::clone(&catalog),
        Arc::clone(&workflow),
        &config,
        Arc::new(test_clock()),
    )
    .await;

    engine.discovery_run().await.unwrap();
    let submitted = catalog.item("i-prop").unwrap();

    workflow.decide("PR-1", "Denied", None);
    engine.reconciliation_run().await.unwrap();
    let decided = catalog.item("i-prop").unwrap();

    (submitted, decided)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pair_is_unique_after_submission_and_gone_after_decision(
        item in properties::item_with_noisy_notes()
    ) {
        let unrelated_before = item["notes"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["itemNoteTypeId"] == "nt-unrelated")
            .count();

        let (submitted, decided) = tokio_test::block_on(submit_then_deny(item));

        prop_assert!(has_in_workflow_code(&submitted));
        prop_assert_eq!(correlation_notes(&submitted), vec!["PR-1".to_string()]);

        prop_assert!(!has_in_workflow_code(&decided));
        prop_assert!(correlation_notes(&decided).is_empty());

        // Notes of other types are never touched.
        let unrelated_after = decided["notes"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["itemNoteTypeId"] == "nt-unrelated")
            .count();
        prop_assert_eq!(unrelated_before, unrelated_after);
    }
}

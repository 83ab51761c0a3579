//! Lifecycle reducer through the Given/When/Then helper.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use lost_items_core::effect::Effect;
use lost_items_core::lifecycle::{
    ApprovalPolicy, Decision, ItemPhase, LifecycleAction, LifecycleEnvironment, LifecycleReducer,
    LostItem, ON_ORDER_STATUS, WITHDRAWN_STATUS,
};
use lost_items_core::model::{CatalogRecord, ItemRecord};
use lost_items_core::notes::NoteKind;
use lost_items_testing::reducer_test::assertions;
use lost_items_testing::{ReducerTest, fixtures, test_clock};
use std::sync::Arc;

fn environment(policy: ApprovalPolicy) -> LifecycleEnvironment {
    let mut rules = fixtures::config().lifecycle_rules();
    rules.approval_policy = policy;
    LifecycleEnvironment::new(rules, Arc::new(test_clock()))
}

fn record(id: &str) -> ItemRecord {
    ItemRecord::from_value(fixtures::item(id, "h1")).unwrap()
}

fn tagged(id: &str, key: &str) -> LostItem {
    let record = ItemRecord::from_value(fixtures::item_in_workflow(id, "h1", key)).unwrap();
    LostItem::in_workflow(record, key.to_string())
}

fn decision(decision: Decision) -> LifecycleAction {
    LifecycleAction::DecisionReceived {
        decision,
        update_date: Some("2025-03-04T10:00:00Z".to_string()),
    }
}

#[test]
fn test_submission_tags_and_requests_reload() {
    let env = environment(ApprovalPolicy::Withdraw);
    let notes = env.rules.notes.clone();

    ReducerTest::new(LifecycleReducer)
        .with_env(env)
        .given_state(LostItem::discovered(record("i1")))
        .when_action(LifecycleAction::SubmissionAccepted { key: "PR-1".to_string() })
        .then_state(move |item| {
            assert_eq!(item.phase, ItemPhase::Submitted);
            assert_eq!(item.key.as_deref(), Some("PR-1"));
            assert!(item.record.has_statistical_code(fixtures::IN_WORKFLOW_CODE));
            assert_eq!(notes.read(&item.record, NoteKind::Correlation), Some("PR-1"));
        })
        .then_effects(|effects| {
            assertions::assert_writes_item_first(effects);
            assert_eq!(effects[1], Effect::ReloadItem { item_id: "i1".to_string() });
            assertions::assert_no_cascade(effects);
        })
        .run();
}

#[test]
fn test_reload_after_submission_withdraws() {
    ReducerTest::new(LifecycleReducer)
        .with_env(environment(ApprovalPolicy::Withdraw))
        .given_state(LostItem::discovered(record("i1")))
        .when_action(LifecycleAction::SubmissionAccepted { key: "PR-1".to_string() })
        .when_action(LifecycleAction::Reloaded(record("i1")))
        .then_state(|item| {
            assert_eq!(item.phase, ItemPhase::Withdrawn);
            assert_eq!(item.record.status_name(), Some(WITHDRAWN_STATUS));
            assert!(item.record.is_suppressed());
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 2);
            assertions::assert_writes_item_first(effects);
            assertions::assert_cascades_from(effects, "h1");
        })
        .run();
}

#[test]
fn test_denial_withdraws_and_cascades() {
    let env = environment(ApprovalPolicy::Withdraw);
    let notes = env.rules.notes.clone();

    ReducerTest::new(LifecycleReducer)
        .with_env(env)
        .given_state(tagged("i1", "PR-1"))
        .when_action(decision(Decision::Denied))
        .then_state(move |item| {
            assert_eq!(item.phase, ItemPhase::Withdrawn);
            assert!(!item.record.has_statistical_code(fixtures::IN_WORKFLOW_CODE));
            assert_eq!(notes.count(&item.record, NoteKind::Correlation), 0);
            assert_eq!(
                notes.read(&item.record, NoteKind::Comment),
                Some("At 2025-03-04T10:00:00Z a selector decided to withdraw this lost item.")
            );
        })
        .then_effects(|effects| assertions::assert_cascades_from(effects, "h1"))
        .run();
}

#[test]
fn test_approval_under_on_order_policy_stays_visible() {
    ReducerTest::new(LifecycleReducer)
        .with_env(environment(ApprovalPolicy::OnOrder))
        .given_state(tagged("i1", "PR-1"))
        .when_action(decision(Decision::Approved))
        .then_state(|item| {
            assert_eq!(item.phase, ItemPhase::OnOrder);
            assert_eq!(item.record.status_name(), Some(ON_ORDER_STATUS));
            assert!(!item.record.is_suppressed());
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_no_cascade(effects);
        })
        .run();
}

#[test]
fn test_terminal_items_ignore_further_decisions() {
    ReducerTest::new(LifecycleReducer)
        .with_env(environment(ApprovalPolicy::Withdraw))
        .given_state(tagged("i1", "PR-1"))
        .when_action(decision(Decision::Denied))
        .when_action(decision(Decision::Approved))
        .then_state(|item| {
            assert_eq!(item.phase, ItemPhase::Withdrawn);
            assert_eq!(item.record.circulation_notes().count(), 1);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn test_decision_for_undiscovered_item_is_ignored() {
    ReducerTest::new(LifecycleReducer)
        .with_env(environment(ApprovalPolicy::Withdraw))
        .given_state(LostItem::discovered(record("i1")))
        .when_action(decision(Decision::Denied))
        .then_state(|item| {
            assert_eq!(item.phase, ItemPhase::Discovered);
            assert_eq!(item.record, record("i1"));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

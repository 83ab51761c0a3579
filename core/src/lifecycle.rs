//! Lost-item lifecycle state machine.
//!
//! ```text
//! Discovered ──SubmissionAccepted──► Submitted ──Reloaded──────────► Withdrawn
//!                                        │
//!                                        ├──DecisionReceived(Denied)──► Withdrawn
//!                                        └──DecisionReceived(Approved)─► Withdrawn | OnOrder
//! ```
//!
//! The reducer only edits the in-memory catalog record and describes the
//! catalog writes that must follow; the runtime executes them in order.
//! `Withdrawn` and `OnOrder` are terminal.

use crate::effect::Effect;
use crate::environment::Clock;
use crate::model::{CatalogRecord, ItemRecord};
use crate::notes::{NoteChannel, NoteKind};
use crate::reducer::Reducer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Status name given to withdrawn items.
pub const WITHDRAWN_STATUS: &str = "Withdrawn";

/// Status name given to approved items under [`ApprovalPolicy::OnOrder`].
pub const ON_ORDER_STATUS: &str = "On order";

/// Circulation note type used for the routing instruction.
pub const CIRCULATION_NOTE_TYPE: &str = "Check in";

/// Routing instruction attached to withdrawn items.
pub const WITHDRAWN_CIRCULATION_NOTE: &str = "Withdrawn lost item: route to Cataloging.";

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    /// Found by the discovery search, not yet submitted.
    Discovered,
    /// Carries the correlation pair and awaits a decision.
    Submitted,
    /// Withdrawn and hidden from discovery.
    Withdrawn,
    /// Approved and left visible with an on-order status.
    OnOrder,
}

impl ItemPhase {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Withdrawn | Self::OnOrder)
    }
}

/// Outcome reported by the workflow service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// A selector decided to re-purchase.
    Approved,
    /// A selector decided to withdraw.
    Denied,
}

impl Decision {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

/// What an approval does to the catalog item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    /// Approved items are withdrawn exactly like denied ones.
    #[default]
    Withdraw,
    /// Approved items get an on-order status and stay visible.
    OnOrder,
}

/// Catalog conventions the lifecycle depends on.
#[derive(Debug, Clone)]
pub struct LifecycleRules {
    /// Statistical code marking items in the workflow.
    pub in_workflow_code: String,
    /// Note channel carrying correlation keys and comments.
    pub notes: NoteChannel,
    /// Effect of an approval.
    pub approval_policy: ApprovalPolicy,
}

/// Environment injected into the lifecycle reducer.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Catalog conventions.
    pub rules: LifecycleRules,
    /// Time source for note dates.
    pub clock: Arc<dyn Clock>,
}

impl LifecycleEnvironment {
    /// Create an environment.
    #[must_use]
    pub fn new(rules: LifecycleRules, clock: Arc<dyn Clock>) -> Self {
        Self { rules, clock }
    }
}

/// One item being driven through the lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LostItem {
    /// Current phase.
    pub phase: ItemPhase,
    /// Raw catalog record, edited in place.
    pub record: ItemRecord,
    /// Workflow correlation key once submitted.
    pub key: Option<String>,
}

impl LostItem {
    /// An item found by discovery.
    #[must_use]
    pub const fn discovered(record: ItemRecord) -> Self {
        Self {
            phase: ItemPhase::Discovered,
            record,
            key: None,
        }
    }

    /// An item already tagged as awaiting a decision.
    #[must_use]
    pub const fn in_workflow(record: ItemRecord, key: String) -> Self {
        Self {
            phase: ItemPhase::Submitted,
            record,
            key: Some(key),
        }
    }
}

/// Inputs to the lifecycle reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleAction {
    /// The workflow accepted the purchase request and assigned `key`.
    SubmissionAccepted {
        /// Correlation key
        key: String,
    },
    /// Fresh copy of the item fetched after it was marked submitted.
    Reloaded(ItemRecord),
    /// The workflow reached a decision.
    DecisionReceived {
        /// Outcome
        decision: Decision,
        /// Decision timestamp as reported by the workflow
        update_date: Option<String>,
    },
}

/// Pure lifecycle transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleReducer;

impl Reducer for LifecycleReducer {
    type State = LostItem;
    type Action = LifecycleAction;
    type Environment = LifecycleEnvironment;

    fn reduce(
        &self,
        state: &mut LostItem,
        action: LifecycleAction,
        env: &LifecycleEnvironment,
    ) -> Vec<Effect> {
        let rules = &env.rules;
        match (state.phase, action) {
            (ItemPhase::Discovered, LifecycleAction::SubmissionAccepted { key }) => {
                apply_correlation_pair(&mut state.record, rules, &key);
                state.key = Some(key);
                state.phase = ItemPhase::Submitted;

                let mut effects = vec![Effect::PutItem];
                if let Some(item_id) = state.record.id() {
                    effects.push(Effect::ReloadItem {
                        item_id: item_id.to_string(),
                    });
                }
                effects
            },

            (ItemPhase::Submitted, LifecycleAction::Reloaded(record))
                if record.id() == state.record.id() =>
            {
                state.record = record;
                withdraw(state, env)
            },

            (ItemPhase::Submitted, LifecycleAction::DecisionReceived { decision, update_date }) => {
                clear_correlation_pair(&mut state.record, rules);
                let at = update_date.unwrap_or_else(|| env.clock.now().to_rfc3339());
                let verb = match decision {
                    Decision::Approved => "re-purchase",
                    Decision::Denied => "withdraw",
                };
                rules.notes.append(
                    &mut state.record,
                    NoteKind::Comment,
                    &format!("At {at} a selector decided to {verb} this lost item."),
                );

                match (decision, rules.approval_policy) {
                    (Decision::Approved, ApprovalPolicy::OnOrder) => {
                        state.record.set_status_name(ON_ORDER_STATUS);
                        state.phase = ItemPhase::OnOrder;
                        vec![Effect::PutItem]
                    },
                    _ => withdraw(state, env),
                }
            },

            // Invalid transitions leave the item untouched
            _ => vec![],
        }
    }
}

/// Tag an item as awaiting a decision under `key`.
///
/// The code and the note are always set together; re-applying replaces the
/// previous key instead of adding a second note.
pub fn apply_correlation_pair(record: &mut ItemRecord, rules: &LifecycleRules, key: &str) {
    record.add_statistical_code(&rules.in_workflow_code);
    rules.notes.write_unique(record, NoteKind::Correlation, key);
}

/// Remove every trace of the correlation pair.
pub fn clear_correlation_pair(record: &mut ItemRecord, rules: &LifecycleRules) {
    record.remove_statistical_code(&rules.in_workflow_code);
    rules.notes.clear(record, NoteKind::Correlation);
}

fn withdraw(state: &mut LostItem, env: &LifecycleEnvironment) -> Vec<Effect> {
    let record = &mut state.record;
    record.set_status_name(WITHDRAWN_STATUS);
    record.suppress();

    let already_routed = record.circulation_notes().any(|note| {
        note.get("note").and_then(Value::as_str) == Some(WITHDRAWN_CIRCULATION_NOTE)
    });
    if !already_routed {
        let mut note = Map::new();
        note.insert("noteType".to_string(), Value::String(CIRCULATION_NOTE_TYPE.to_string()));
        note.insert("note".to_string(), Value::String(WITHDRAWN_CIRCULATION_NOTE.to_string()));
        note.insert("staffOnly".to_string(), Value::Bool(true));
        note.insert("date".to_string(), Value::String(env.clock.now().to_rfc3339()));
        record.push_circulation_note(Value::Object(note));
    }
    state.phase = ItemPhase::Withdrawn;

    let mut effects = vec![Effect::PutItem];
    if let Some(holdings_record_id) = record.holdings_record_id() {
        effects.push(Effect::CascadeSuppression {
            holdings_record_id: holdings_record_id.to_string(),
        });
    }
    effects
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::environment::SystemClock;
    use serde_json::json;

    fn env(policy: ApprovalPolicy) -> LifecycleEnvironment {
        LifecycleEnvironment::new(
            LifecycleRules {
                in_workflow_code: "wf".to_string(),
                notes: NoteChannel::new(
                    "corr".to_string(),
                    "patron".to_string(),
                    "comment".to_string(),
                    None,
                ),
                approval_policy: policy,
            },
            Arc::new(SystemClock),
        )
    }

    fn record() -> ItemRecord {
        ItemRecord::from_value(json!({
            "id": "item-1",
            "holdingsRecordId": "hold-1",
            "status": {"name": "Lost", "date": "2024-01-01"},
            "discoverySuppress": false,
            "statisticalCodeIds": [],
            "notes": [],
        }))
        .unwrap()
    }

    fn correlation_notes(item: &LostItem, env: &LifecycleEnvironment) -> usize {
        env.rules.notes.count(&item.record, NoteKind::Correlation)
    }

    #[test]
    fn test_submission_applies_pair_and_reloads() {
        let env = env(ApprovalPolicy::Withdraw);
        let mut item = LostItem::discovered(record());

        let effects = LifecycleReducer.reduce(
            &mut item,
            LifecycleAction::SubmissionAccepted { key: "PR-1".to_string() },
            &env,
        );

        assert_eq!(item.phase, ItemPhase::Submitted);
        assert!(item.record.has_statistical_code("wf"));
        assert_eq!(correlation_notes(&item, &env), 1);
        assert_eq!(
            effects,
            vec![Effect::PutItem, Effect::ReloadItem { item_id: "item-1".to_string() }]
        );
    }

    #[test]
    fn test_reload_forces_withdrawn_state() {
        let env = env(ApprovalPolicy::Withdraw);
        let mut item = LostItem::in_workflow(record(), "PR-1".to_string());

        let effects = LifecycleReducer.reduce(&mut item, LifecycleAction::Reloaded(record()), &env);

        assert_eq!(item.phase, ItemPhase::Withdrawn);
        assert_eq!(item.record.status_name(), Some(WITHDRAWN_STATUS));
        assert!(item.record.is_suppressed());
        assert_eq!(item.record.circulation_notes().count(), 1);
        assert_eq!(item.record.document()["status"]["date"], "2024-01-01");
        assert_eq!(
            effects,
            vec![
                Effect::PutItem,
                Effect::CascadeSuppression { holdings_record_id: "hold-1".to_string() }
            ]
        );
    }

    #[test]
    fn test_reload_of_other_item_is_ignored() {
        let env = env(ApprovalPolicy::Withdraw);
        let mut item = LostItem::in_workflow(record(), "PR-1".to_string());
        let other = ItemRecord::from_value(json!({"id": "item-2"})).unwrap();

        let effects = LifecycleReducer.reduce(&mut item, LifecycleAction::Reloaded(other), &env);

        assert!(effects.is_empty());
        assert_eq!(item.phase, ItemPhase::Submitted);
    }

    #[test]
    fn test_denial_clears_pair_and_withdraws() {
        let env = env(ApprovalPolicy::Withdraw);
        let mut record = record();
        apply_correlation_pair(&mut record, &env.rules, "PR-1");
        let mut item = LostItem::in_workflow(record, "PR-1".to_string());

        let effects = LifecycleReducer.reduce(
            &mut item,
            LifecycleAction::DecisionReceived {
                decision: Decision::Denied,
                update_date: Some("2025-03-04T10:00:00Z".to_string()),
            },
            &env,
        );

        assert_eq!(item.phase, ItemPhase::Withdrawn);
        assert!(!item.record.has_statistical_code("wf"));
        assert_eq!(correlation_notes(&item, &env), 0);
        assert_eq!(
            env.rules.notes.read(&item.record, NoteKind::Comment),
            Some("At 2025-03-04T10:00:00Z a selector decided to withdraw this lost item.")
        );
        assert_eq!(effects.len(), 2);
    }

    #[test]
    fn test_approval_on_order_policy_keeps_item_visible() {
        let env = env(ApprovalPolicy::OnOrder);
        let mut record = record();
        apply_correlation_pair(&mut record, &env.rules, "PR-1");
        let mut item = LostItem::in_workflow(record, "PR-1".to_string());

        let effects = LifecycleReducer.reduce(
            &mut item,
            LifecycleAction::DecisionReceived { decision: Decision::Approved, update_date: None },
            &env,
        );

        assert_eq!(item.phase, ItemPhase::OnOrder);
        assert_eq!(item.record.status_name(), Some(ON_ORDER_STATUS));
        assert!(!item.record.is_suppressed());
        assert_eq!(correlation_notes(&item, &env), 0);
        assert_eq!(effects, vec![Effect::PutItem]);
    }

    #[test]
    fn test_terminal_phase_rejects_further_actions() {
        let env = env(ApprovalPolicy::Withdraw);
        let mut item = LostItem::in_workflow(record(), "PR-1".to_string());
        item.phase = ItemPhase::Withdrawn;
        let before = item.clone();

        let effects = LifecycleReducer.reduce(
            &mut item,
            LifecycleAction::SubmissionAccepted { key: "PR-2".to_string() },
            &env,
        );

        assert!(effects.is_empty());
        assert_eq!(item, before);
    }
}

//! Scripted workflow service.

use lost_items_core::environment::WorkflowClient;
use lost_items_core::error::{WorkflowError, WorkflowResult};
use lost_items_core::model::PurchaseRequest;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct WorkflowState {
    next_key: u64,
    submissions: Vec<PurchaseRequest>,
    refused_titles: HashSet<String>,
    keyless_titles: HashSet<String>,
    requests: HashMap<String, PurchaseRequest>,
    failing_keys: HashSet<String>,
    lookups: Vec<String>,
}

/// A workflow service that assigns sequential keys (`PR-1`, `PR-2`, …) and
/// answers lookups from scripted decisions.
#[derive(Default)]
pub struct ScriptedWorkflow {
    state: Mutex<WorkflowState>,
}

impl ScriptedWorkflow {
    /// A workflow that accepts every submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse submissions whose title equals `title`.
    pub fn refuse_title(&self, title: &str) {
        self.state().refused_titles.insert(title.to_string());
    }

    /// Accept submissions whose title equals `title` but answer without a
    /// key.
    pub fn omit_key_for_title(&self, title: &str) {
        self.state().keyless_titles.insert(title.to_string());
    }

    /// Record a decision for `key`.
    pub fn decide(&self, key: &str, status: &str, update_date: Option<&str>) {
        let request = PurchaseRequest {
            key: Some(key.to_string()),
            status: Some(status.to_string()),
            update_date: update_date.map(str::to_string),
            ..PurchaseRequest::default()
        };
        self.state().requests.insert(key.to_string(), request);
    }

    /// Make lookups of `key` fail.
    pub fn fail_lookup(&self, key: &str) {
        self.state().failing_keys.insert(key.to_string());
    }

    /// Requests submitted so far, as received.
    #[must_use]
    pub fn submissions(&self) -> Vec<PurchaseRequest> {
        self.state().submissions.clone()
    }

    /// Keys looked up so far.
    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.state().lookups.clone()
    }

    fn serve_submit(&self, request: &PurchaseRequest) -> WorkflowResult<PurchaseRequest> {
        let mut state = self.state();
        state.submissions.push(request.clone());

        if request
            .title
            .as_ref()
            .is_some_and(|title| state.refused_titles.contains(title))
        {
            return Err(WorkflowError::UnexpectedStatus {
                status: 400,
                body: "refused".to_string(),
            });
        }

        state.next_key += 1;
        if request
            .title
            .as_ref()
            .is_some_and(|title| state.keyless_titles.contains(title))
        {
            return Ok(PurchaseRequest {
                key: None,
                id: i64::try_from(state.next_key).ok(),
                existing_folio_item_id: None,
                existing_folio_item: None,
                ..request.clone()
            });
        }
        let key = format!("PR-{}", state.next_key);
        let saved = PurchaseRequest {
            key: Some(key.clone()),
            id: i64::try_from(state.next_key).ok(),
            existing_folio_item_id: None,
            existing_folio_item: None,
            ..request.clone()
        };
        state.requests.insert(key, saved.clone());
        Ok(saved)
    }

    fn serve_lookup(&self, key: &str) -> WorkflowResult<Option<PurchaseRequest>> {
        let mut state = self.state();
        state.lookups.push(key.to_string());
        if state.failing_keys.contains(key) {
            return Err(WorkflowError::RequestFailed(format!("{key}: injected failure")));
        }
        Ok(state.requests.get(key).cloned())
    }
}

impl WorkflowClient for ScriptedWorkflow {
    fn submit(
        &self,
        request: &PurchaseRequest,
    ) -> impl Future<Output = WorkflowResult<PurchaseRequest>> + Send {
        let result = self.serve_submit(request);
        async move { result }
    }

    fn get_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = WorkflowResult<Option<PurchaseRequest>>> + Send {
        let result = self.serve_lookup(key);
        async move { result }
    }
}

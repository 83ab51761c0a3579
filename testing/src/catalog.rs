//! In-memory catalog speaking the FOLIO resource layout.

use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{CatalogError, CatalogResult};
use lost_items_core::query::CqlQuery;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

const ITEMS: &str = "/inventory/items";
const ITEMS_BY_HOLDING: &str = "/inventory/items-by-holdings-id";
const HOLDINGS: &str = "/holdings-storage/holdings";
const INSTANCES: &str = "/inventory/instances";
const CIRCULATION_LOGS: &str = "/audit-data/circulation/logs";
const STATISTICAL_CODES: &str = "/statistical-codes";

/// One GET the catalog served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedGet {
    /// Request path
    pub path: String,
    /// CQL query, if any
    pub query: Option<String>,
    /// Page size, if any
    pub limit: Option<usize>,
    /// Page offset, if any
    pub offset: Option<usize>,
}

#[derive(Default)]
struct CatalogState {
    items: BTreeMap<String, Value>,
    holdings: BTreeMap<String, Value>,
    instances: BTreeMap<String, Value>,
    statistical_codes: Vec<Value>,
    checkouts: HashMap<String, u64>,
    failing_paths: HashSet<String>,
    rejected_paths: HashSet<String>,
    gets: Vec<RecordedGet>,
    puts: Vec<(String, Value)>,
}

/// A catalog held in memory.
///
/// Item searches understand the filter shapes the service generates:
/// `statisticalCodeIds=="X"` on its own, and the discovery filter with its
/// status, damaged-code, patron-note and exclusion clauses. Every GET and PUT
/// is recorded. Paths can be made to fail (`Err`) or to refuse writes
/// (`Ok(false)`).
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an item.
    pub fn insert_item(&self, item: Value) {
        if let Some(id) = id_of(&item) {
            self.state().items.insert(id, item);
        }
    }

    /// Add or replace a holding.
    pub fn insert_holding(&self, holding: Value) {
        if let Some(id) = id_of(&holding) {
            self.state().holdings.insert(id, holding);
        }
    }

    /// Add or replace an instance.
    pub fn insert_instance(&self, instance: Value) {
        if let Some(id) = id_of(&instance) {
            self.state().instances.insert(id, instance);
        }
    }

    /// Add a statistical code record.
    pub fn insert_statistical_code(&self, code: Value) {
        self.state().statistical_codes.push(code);
    }

    /// Set the circulation-log checkout count for a barcode.
    pub fn set_checkouts(&self, barcode: &str, count: u64) {
        self.state().checkouts.insert(barcode.to_string(), count);
    }

    /// Make every request whose path starts with `prefix` fail.
    pub fn fail_path(&self, prefix: &str) {
        self.state().failing_paths.insert(prefix.to_string());
    }

    /// Make PUTs to exactly `path` return `Ok(false)`.
    pub fn reject_put(&self, path: &str) {
        self.state().rejected_paths.insert(path.to_string());
    }

    /// Current state of an item.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<Value> {
        self.state().items.get(id).cloned()
    }

    /// Current state of a holding.
    #[must_use]
    pub fn holding(&self, id: &str) -> Option<Value> {
        self.state().holdings.get(id).cloned()
    }

    /// Current state of an instance.
    #[must_use]
    pub fn instance(&self, id: &str) -> Option<Value> {
        self.state().instances.get(id).cloned()
    }

    /// Every GET served so far.
    #[must_use]
    pub fn gets(&self) -> Vec<RecordedGet> {
        self.state().gets.clone()
    }

    /// Every accepted PUT so far, as `(path, body)`.
    #[must_use]
    pub fn puts(&self) -> Vec<(String, Value)> {
        self.state().puts.clone()
    }

    /// Paths of accepted PUTs, in order.
    #[must_use]
    pub fn put_paths(&self) -> Vec<String> {
        self.state().puts.iter().map(|(path, _)| path.clone()).collect()
    }

    fn serve_get(
        &self,
        path: &str,
        query: Option<&CqlQuery>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> CatalogResult<Value> {
        let mut state = self.state();
        state.gets.push(RecordedGet {
            path: path.to_string(),
            query: query.map(|q| q.as_str().to_string()),
            limit,
            offset,
        });
        fail_if_configured(&state, path)?;

        let query = query.map(CqlQuery::as_str).unwrap_or_default();
        let page = |records: Vec<Value>| -> Vec<Value> {
            records
                .into_iter()
                .skip(offset.unwrap_or(0))
                .take(limit.unwrap_or(usize::MAX))
                .collect()
        };

        match path {
            ITEMS => {
                let matches: Vec<Value> = state
                    .items
                    .values()
                    .filter(|item| matches_item_query(item, query))
                    .cloned()
                    .collect();
                let total = matches.len();
                Ok(json!({"items": page(matches), "totalRecords": total}))
            },
            ITEMS_BY_HOLDING => {
                let holding_id = quoted_after(query, "holdingsRecordId==").pop().unwrap_or_default();
                let matches: Vec<Value> = state
                    .items
                    .values()
                    .filter(|item| item["holdingsRecordId"].as_str() == Some(holding_id.as_str()))
                    .cloned()
                    .collect();
                let total = matches.len();
                Ok(json!({"items": page(matches), "totalRecords": total}))
            },
            HOLDINGS => {
                let instance_id = quoted_after(query, "instanceId==").pop().unwrap_or_default();
                let matches: Vec<Value> = state
                    .holdings
                    .values()
                    .filter(|holding| holding["instanceId"].as_str() == Some(instance_id.as_str()))
                    .cloned()
                    .collect();
                let total = matches.len();
                Ok(json!({"holdingsRecords": page(matches), "totalRecords": total}))
            },
            CIRCULATION_LOGS => {
                let pattern = quoted_after(query, "items==").pop().unwrap_or_default();
                let barcode = pattern.trim_matches('*');
                let total = state.checkouts.get(barcode).copied().unwrap_or(0);
                Ok(json!({"logRecords": [], "totalRecords": total}))
            },
            STATISTICAL_CODES => {
                let type_id = quoted_after(query, "statisticalCodeTypeId==").pop().unwrap_or_default();
                let matches: Vec<Value> = state
                    .statistical_codes
                    .iter()
                    .filter(|code| code["statisticalCodeTypeId"].as_str() == Some(type_id.as_str()))
                    .cloned()
                    .collect();
                let total = matches.len();
                Ok(json!({"statisticalCodes": page(matches), "totalRecords": total}))
            },
            _ => single_record(&state, path).ok_or_else(|| not_found(path)),
        }
    }

    fn serve_put(&self, path: &str, body: &Value) -> CatalogResult<bool> {
        let mut state = self.state();
        fail_if_configured(&state, path)?;
        if state.rejected_paths.contains(path) {
            return Ok(false);
        }

        let (collection, id) = path.rsplit_once('/').ok_or_else(|| not_found(path))?;
        let records = match collection {
            ITEMS => &mut state.items,
            HOLDINGS => &mut state.holdings,
            INSTANCES => &mut state.instances,
            _ => return Err(not_found(path)),
        };
        if !records.contains_key(id) {
            return Err(not_found(path));
        }
        records.insert(id.to_string(), body.clone());
        state.puts.push((path.to_string(), body.clone()));
        Ok(true)
    }
}

impl CatalogClient for InMemoryCatalog {
    fn get(
        &self,
        path: &str,
        query: Option<&CqlQuery>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> impl Future<Output = CatalogResult<Value>> + Send {
        let result = self.serve_get(path, query, limit, offset);
        async move { result }
    }

    fn put(&self, path: &str, body: &Value) -> impl Future<Output = CatalogResult<bool>> + Send {
        let result = self.serve_put(path, body);
        async move { result }
    }
}

fn id_of(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

fn fail_if_configured(state: &CatalogState, path: &str) -> CatalogResult<()> {
    if state.failing_paths.iter().any(|prefix| path.starts_with(prefix.as_str())) {
        return Err(CatalogError::RequestFailed(format!("{path}: injected failure")));
    }
    Ok(())
}

fn not_found(path: &str) -> CatalogError {
    CatalogError::UnexpectedStatus {
        path: path.to_string(),
        status: 404,
        body: "Not found".to_string(),
    }
}

fn single_record(state: &CatalogState, path: &str) -> Option<Value> {
    let (collection, id) = path.rsplit_once('/')?;
    match collection {
        ITEMS => state.items.get(id).cloned(),
        HOLDINGS => state.holdings.get(id).cloned(),
        INSTANCES => state.instances.get(id).cloned(),
        _ => None,
    }
}

fn matches_item_query(item: &Value, query: &str) -> bool {
    let codes: Vec<&str> = item["statisticalCodeIds"]
        .as_array()
        .map(|codes| codes.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    // Bare membership query used by reconciliation.
    if let Some(code) = query
        .strip_prefix("statisticalCodeIds==")
        .filter(|rest| !rest.contains(' '))
    {
        return codes.contains(&code.trim_matches('"'));
    }

    let (selection, exclusion) = query.split_once(" not ").unwrap_or((query, ""));
    let statuses = quoted_after(selection, "status.name==");
    let selecting_codes = quoted_after(selection, "statisticalCodeIds==");
    let required_notes = quoted_after(selection, "notes.itemNoteTypeId==");
    let excluded_codes = quoted_after(exclusion, "statisticalCodeIds==");

    let status = item["status"]["name"].as_str().unwrap_or_default();
    let selected = statuses.iter().any(|s| s == status)
        || codes.iter().any(|c| selecting_codes.iter().any(|s| s == c));
    let notes_present = required_notes.iter().all(|note_type| {
        item["notes"]
            .as_array()
            .is_some_and(|notes| notes.iter().any(|n| n["itemNoteTypeId"].as_str() == Some(note_type.as_str())))
    });
    let excluded = codes.iter().any(|c| excluded_codes.iter().any(|e| e == c));
    let visible_required = query.contains("discoverySuppress==false");
    let suppressed = item["discoverySuppress"].as_bool() == Some(true);

    selected && notes_present && !excluded && !(visible_required && suppressed)
}

/// Every quoted value following `marker` in `text`, unescaped.
fn quoted_after(text: &str, marker: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(marker) {
        rest = &rest[start + marker.len()..];
        let Some(body) = rest.strip_prefix('"') else {
            continue;
        };
        let mut value = String::new();
        let mut chars = body.char_indices();
        let mut end = body.len();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                },
                '"' => {
                    end = i + 1;
                    break;
                },
                _ => value.push(c),
            }
        }
        values.push(value);
        rest = &body[end..];
    }
    values
}

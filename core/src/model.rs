//! Catalog records and the purchase-request transfer entity.
//!
//! Catalog records are kept as the raw JSON object the catalog returned. Every
//! update is a full-record PUT, so fields this service does not understand must
//! survive untouched; the wrappers only expose typed reads and targeted patches.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Common behaviour of the three catalog record levels.
pub trait CatalogRecord {
    /// Record kind used in logs and errors.
    const KIND: &'static str;

    /// The preserved JSON document.
    fn document(&self) -> &Map<String, Value>;

    /// Mutable access to the preserved JSON document.
    fn document_mut(&mut self) -> &mut Map<String, Value>;

    /// Record identifier.
    fn id(&self) -> Option<&str> {
        str_field(self.document(), "id")
    }

    /// Whether the record is hidden from discovery.
    ///
    /// An absent or non-boolean flag reads as not suppressed.
    fn is_suppressed(&self) -> bool {
        self.document()
            .get("discoverySuppress")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Hide the record from discovery. There is deliberately no inverse.
    fn suppress(&mut self) {
        self.document_mut()
            .insert("discoverySuppress".to_string(), Value::Bool(true));
    }

    /// The whole record as a JSON value, ready for a PUT.
    fn to_value(&self) -> Value {
        Value::Object(self.document().clone())
    }
}

macro_rules! catalog_record {
    ($name:ident, $kind:literal) => {
        impl $name {
            /// Wrap a raw catalog payload.
            ///
            /// # Errors
            ///
            /// Returns [`ParseError::NotAnObject`] when the payload is not a JSON object.
            pub fn from_value(value: Value) -> Result<Self, ParseError> {
                match value {
                    Value::Object(map) => Ok(Self(map)),
                    _ => Err(ParseError::NotAnObject),
                }
            }
        }

        impl CatalogRecord for $name {
            const KIND: &'static str = $kind;

            fn document(&self) -> &Map<String, Value> {
                &self.0
            }

            fn document_mut(&mut self) -> &mut Map<String, Value> {
                &mut self.0
            }
        }

        impl From<Map<String, Value>> for $name {
            fn from(map: Map<String, Value>) -> Self {
                Self(map)
            }
        }
    };
}

/// A physical copy in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRecord(Map<String, Value>);

/// A location grouping of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingRecord(Map<String, Value>);

/// A bibliographic work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceRecord(Map<String, Value>);

catalog_record!(ItemRecord, "item");
catalog_record!(HoldingRecord, "holding");
catalog_record!(InstanceRecord, "instance");

impl ItemRecord {
    /// Item title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        str_field(&self.0, "title")
    }

    /// Item barcode.
    #[must_use]
    pub fn barcode(&self) -> Option<&str> {
        str_field(&self.0, "barcode")
    }

    /// Parent holding identifier.
    #[must_use]
    pub fn holdings_record_id(&self) -> Option<&str> {
        str_field(&self.0, "holdingsRecordId")
    }

    /// Name of the first contributor, when there is one.
    #[must_use]
    pub fn first_contributor(&self) -> Option<&str> {
        self.0
            .get("contributorNames")
            .and_then(Value::as_array)
            .and_then(|names| names.first())
            .and_then(|name| name.get("name"))
            .and_then(Value::as_str)
    }

    /// Call number, falling back to the effective call number components.
    #[must_use]
    pub fn call_number(&self) -> Option<&str> {
        str_field(&self.0, "callNumber")
            .filter(|s| !s.is_empty())
            .or_else(|| {
                self.0
                    .get("effectiveCallNumberComponents")
                    .and_then(|c| c.get("callNumber"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
    }

    /// Current status name.
    #[must_use]
    pub fn status_name(&self) -> Option<&str> {
        self.0
            .get("status")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
    }

    /// Replace the status name, keeping any other status fields.
    pub fn set_status_name(&mut self, name: &str) {
        let status = self
            .0
            .entry("status")
            .or_insert_with(|| Value::Object(Map::new()));
        if !status.is_object() {
            *status = Value::Object(Map::new());
        }
        if let Value::Object(status) = status {
            status.insert("name".to_string(), Value::String(name.to_string()));
        }
    }

    /// Statistical code identifiers on the item.
    pub fn statistical_code_ids(&self) -> impl Iterator<Item = &str> {
        self.0
            .get("statisticalCodeIds")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Whether the item carries the given statistical code.
    #[must_use]
    pub fn has_statistical_code(&self, code: &str) -> bool {
        self.statistical_code_ids().any(|c| c == code)
    }

    /// Add a statistical code unless it is already present.
    ///
    /// Returns `true` if the code was added.
    pub fn add_statistical_code(&mut self, code: &str) -> bool {
        if self.has_statistical_code(code) {
            return false;
        }
        self.edit_array("statisticalCodeIds", |codes| codes.push(Value::String(code.to_string())));
        true
    }

    /// Remove every occurrence of a statistical code.
    ///
    /// Returns how many entries were removed.
    pub fn remove_statistical_code(&mut self, code: &str) -> usize {
        self.edit_array("statisticalCodeIds", |codes| {
            let before = codes.len();
            codes.retain(|c| c.as_str() != Some(code));
            before - codes.len()
        })
    }

    /// Circulation notes on the item.
    pub fn circulation_notes(&self) -> impl Iterator<Item = &Value> {
        self.0
            .get("circulationNotes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Append a circulation note object.
    pub fn push_circulation_note(&mut self, note: Value) {
        self.edit_array("circulationNotes", |notes| notes.push(note));
    }

    pub(crate) fn notes(&self) -> &[Value] {
        self.0
            .get("notes")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn edit_notes<R>(&mut self, edit: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        self.edit_array("notes", edit)
    }

    /// Edit an array field in place. A missing or non-array field starts out
    /// empty; an existing field keeps its position in the record.
    fn edit_array<R>(&mut self, field: &str, edit: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut values = match self.0.get_mut(field).map(Value::take) {
            Some(Value::Array(values)) => values,
            _ => Vec::new(),
        };
        let result = edit(&mut values);
        self.0.insert(field.to_string(), Value::Array(values));
        result
    }
}

impl HoldingRecord {
    /// Parent instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        str_field(&self.0, "instanceId")
    }
}

impl InstanceRecord {
    /// Stable human-readable identifier.
    #[must_use]
    pub fn hrid(&self) -> Option<&str> {
        str_field(&self.0, "hrid")
    }

    /// Display title normalised for indexing, when the catalog computed one.
    #[must_use]
    pub fn index_title(&self) -> Option<&str> {
        str_field(&self.0, "indexTitle").filter(|s| !s.is_empty())
    }

    /// Set the instance status identifier.
    pub fn set_status_id(&mut self, status_id: &str) {
        self.0
            .insert("statusId".to_string(), Value::String(status_id.to_string()));
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field).and_then(Value::as_str)
}

/// A replacement-purchase request exchanged with the workflow service.
///
/// The catalog payload the request was built from travels along with it but is
/// never serialised to the workflow service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseRequest {
    /// Correlation key assigned by the workflow service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Workflow-internal numeric id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Title to purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Primary contributor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,
    /// ISBN, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    /// Patron on whose behalf the request is made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_username: Option<String>,
    /// Newline-delimited enrichment log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_comments: Option<String>,
    /// Call number of the lost copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_number: Option<String>,
    /// Name of the submitting client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Decision outcome reported by the workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// When the request was created in the workflow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// When the workflow last changed the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_date: Option<String>,
    /// Catalog id of the item this request replaces.
    #[serde(skip)]
    pub existing_folio_item_id: Option<String>,
    /// Full catalog payload of that item.
    #[serde(skip)]
    pub existing_folio_item: Option<ItemRecord>,
}

impl PurchaseRequest {
    /// Append one line to the requester comments.
    pub fn append_comment(&mut self, line: &str) {
        match &mut self.requester_comments {
            Some(comments) if !comments.is_empty() => {
                comments.push('\n');
                comments.push_str(line);
            },
            _ => self.requester_comments = Some(line.to_string()),
        }
    }

    /// Carry the catalog payload over from the request this one answers.
    #[must_use]
    pub fn with_catalog_item_from(mut self, other: &Self) -> Self {
        self.existing_folio_item_id.clone_from(&other.existing_folio_item_id);
        self.existing_folio_item.clone_from(&other.existing_folio_item);
        self
    }
}

impl fmt::Display for PurchaseRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PurchaseRequest(key={}, title={}, contributor={}, status={})",
            self.key.as_deref().unwrap_or("-"),
            self.title.as_deref().unwrap_or("-"),
            self.contributor.as_deref().unwrap_or("-"),
            self.status.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> ItemRecord {
        ItemRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_unknown_fields_round_trip_in_order() {
        let raw = json!({
            "id": "i1",
            "zeta": {"nested": [1, 2, 3]},
            "title": "T",
            "alpha": null,
        });
        let mut record = item(raw.clone());
        record.set_status_name("Withdrawn");
        record.suppress();

        let out = record.to_value();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[..4], ["id", "zeta", "title", "alpha"]);
        assert_eq!(out["zeta"], raw["zeta"]);
        assert_eq!(out["status"]["name"], "Withdrawn");
    }

    #[test]
    fn test_call_number_fallback() {
        let direct = item(json!({"callNumber": "QA76", "effectiveCallNumberComponents": {"callNumber": "X"}}));
        assert_eq!(direct.call_number(), Some("QA76"));

        let effective = item(json!({"callNumber": "", "effectiveCallNumberComponents": {"callNumber": "PS3"}}));
        assert_eq!(effective.call_number(), Some("PS3"));

        let none = item(json!({"effectiveCallNumberComponents": {}}));
        assert_eq!(none.call_number(), None);
    }

    #[test]
    fn test_statistical_codes_are_never_duplicated() {
        let mut record = item(json!({"statisticalCodeIds": ["a"]}));
        assert!(record.add_statistical_code("wf"));
        assert!(!record.add_statistical_code("wf"));
        assert_eq!(record.statistical_code_ids().collect::<Vec<_>>(), ["a", "wf"]);
    }

    #[test]
    fn test_remove_statistical_code_removes_all() {
        let mut record = item(json!({"statisticalCodeIds": ["wf", "a", "wf"]}));
        assert_eq!(record.remove_statistical_code("wf"), 2);
        assert_eq!(record.statistical_code_ids().collect::<Vec<_>>(), ["a"]);
    }

    #[test]
    fn test_missing_suppression_flag_reads_as_visible() {
        let holding = HoldingRecord::from_value(json!({"id": "h1"})).unwrap();
        assert!(!holding.is_suppressed());
        let holding = HoldingRecord::from_value(json!({"id": "h1", "discoverySuppress": null})).unwrap();
        assert!(!holding.is_suppressed());
    }

    #[test]
    fn test_array_edits_keep_field_position_and_replace_non_arrays() {
        let mut record = item(json!({
            "id": "i1",
            "statisticalCodeIds": "not-a-list",
            "title": "T",
        }));
        assert!(record.add_statistical_code("wf"));
        record.push_circulation_note(json!({"noteType": "Check in"}));

        let out = record.to_value();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["id", "statisticalCodeIds", "title", "circulationNotes"]);
        assert_eq!(out["statisticalCodeIds"], json!(["wf"]));
        assert_eq!(out["circulationNotes"], json!([{"noteType": "Check in"}]));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        assert_eq!(
            ItemRecord::from_value(json!([1])).unwrap_err(),
            ParseError::NotAnObject
        );
    }

    #[test]
    fn test_append_comment_is_newline_delimited() {
        let mut request = PurchaseRequest::default();
        request.append_comment("Lost Item.  Barcode: 123");
        request.append_comment("Damaged beyond repair.");
        assert_eq!(
            request.requester_comments.as_deref(),
            Some("Lost Item.  Barcode: 123\nDamaged beyond repair.")
        );
    }

    #[test]
    fn test_catalog_payload_is_not_serialized() {
        let request = PurchaseRequest {
            key: Some("k1".to_string()),
            existing_folio_item_id: Some("i1".to_string()),
            existing_folio_item: Some(item(json!({"id": "i1"}))),
            ..PurchaseRequest::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({"key": "k1"}));
    }
}

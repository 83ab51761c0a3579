//! Typed access to the catalog paths the service uses.
//!
//! [`CatalogClient`] speaks raw JSON; the gateway knows where items, holdings,
//! instances, usage logs and statistical codes live and wraps each response in
//! the matching record type.

use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{CatalogError, LifecycleError, ParseError, Result};
use lost_items_core::model::{CatalogRecord, HoldingRecord, InstanceRecord, ItemRecord};
use lost_items_core::query::CqlQuery;
use serde_json::Value;
use std::sync::Arc;

/// Catalog resource paths.
pub mod paths {
    /// Item search and single-item root.
    pub const ITEMS: &str = "/inventory/items";
    /// Items of one holding.
    pub const ITEMS_BY_HOLDING: &str = "/inventory/items-by-holdings-id";
    /// Holdings search and single-holding root.
    pub const HOLDINGS: &str = "/holdings-storage/holdings";
    /// Single-instance root.
    pub const INSTANCES: &str = "/inventory/instances";
    /// Circulation audit log.
    pub const CIRCULATION_LOGS: &str = "/audit-data/circulation/logs";
    /// Statistical code search.
    pub const STATISTICAL_CODES: &str = "/statistical-codes";
}

/// A catalog client bound to the service's resource layout.
pub struct CatalogGateway<C> {
    client: Arc<C>,
}

impl<C> Clone for CatalogGateway<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: CatalogClient> CatalogGateway<C> {
    /// Wrap a catalog client.
    #[must_use]
    pub const fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Items matching `query`, as raw payloads so one malformed record cannot
    /// spoil the batch.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if any page fails.
    pub async fn search_items(&self, query: &CqlQuery, limit: Option<usize>) -> Result<Vec<Value>> {
        Ok(self
            .client
            .get_array(paths::ITEMS, Some(query), limit, "items")
            .await?)
    }

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// Returns a catalog error, or [`LifecycleError::Malformed`] if the payload
    /// is not an object.
    pub async fn item(&self, id: &str) -> Result<ItemRecord> {
        let value = self
            .client
            .get(&format!("{}/{id}", paths::ITEMS), None, None, None)
            .await?;
        ItemRecord::from_value(value).map_err(malformed::<ItemRecord>)
    }

    /// Write an item back; `Ok(false)` when the catalog refused it.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`] if the record
    /// has no id.
    pub async fn put_item(&self, item: &ItemRecord) -> Result<bool> {
        self.put(paths::ITEMS, item).await
    }

    /// Every item under a holding.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn items_in_holding(&self, holdings_record_id: &str) -> Result<Vec<ItemRecord>> {
        let query = CqlQuery::field_equals("holdingsRecordId", holdings_record_id);
        let values = self
            .client
            .get_array(paths::ITEMS_BY_HOLDING, Some(&query), None, "items")
            .await?;
        values
            .into_iter()
            .map(|v| ItemRecord::from_value(v).map_err(malformed::<ItemRecord>))
            .collect()
    }

    /// Fetch one holding.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn holding(&self, id: &str) -> Result<HoldingRecord> {
        let value = self
            .client
            .get(&format!("{}/{id}", paths::HOLDINGS), None, None, None)
            .await?;
        HoldingRecord::from_value(value).map_err(malformed::<HoldingRecord>)
    }

    /// Write a holding back; `Ok(false)` when the catalog refused it.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn put_holding(&self, holding: &HoldingRecord) -> Result<bool> {
        self.put(paths::HOLDINGS, holding).await
    }

    /// Every holding under an instance.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn holdings_of_instance(&self, instance_id: &str) -> Result<Vec<HoldingRecord>> {
        let query = CqlQuery::field_equals("instanceId", instance_id);
        let values = self
            .client
            .get_array(paths::HOLDINGS, Some(&query), None, "holdingsRecords")
            .await?;
        values
            .into_iter()
            .map(|v| HoldingRecord::from_value(v).map_err(malformed::<HoldingRecord>))
            .collect()
    }

    /// Fetch one instance.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn instance(&self, id: &str) -> Result<InstanceRecord> {
        let value = self
            .client
            .get(&format!("{}/{id}", paths::INSTANCES), None, None, None)
            .await?;
        InstanceRecord::from_value(value).map_err(malformed::<InstanceRecord>)
    }

    /// Write an instance back; `Ok(false)` when the catalog refused it.
    ///
    /// # Errors
    ///
    /// Returns a catalog error or [`LifecycleError::Malformed`].
    pub async fn put_instance(&self, instance: &InstanceRecord) -> Result<bool> {
        self.put(paths::INSTANCES, instance).await
    }

    /// Number of checkouts the circulation log records for a barcode.
    ///
    /// Uses `totalRecords` when the log reports it, otherwise counts the
    /// returned entries.
    ///
    /// # Errors
    ///
    /// Returns a catalog error, or [`CatalogError::DecodeFailed`] when the
    /// response carries neither a total nor a record list.
    pub async fn checkout_count(&self, barcode: &str) -> Result<u64> {
        let query = CqlQuery::new(format!(
            "items=={} and action==\"Checked out\"",
            quote_wildcard(barcode)
        ));
        let response = self
            .client
            .get(paths::CIRCULATION_LOGS, Some(&query), None, None)
            .await?;

        if let Some(total) = response.get("totalRecords").and_then(Value::as_u64) {
            return Ok(total);
        }
        response
            .get("logRecords")
            .and_then(Value::as_array)
            .map(|records| records.len() as u64)
            .ok_or_else(|| {
                CatalogError::DecodeFailed(format!(
                    "{}: missing `totalRecords` and `logRecords`",
                    paths::CIRCULATION_LOGS
                ))
                .into()
            })
    }

    /// Statistical codes of one code type.
    ///
    /// # Errors
    ///
    /// Returns a catalog error if any page fails.
    pub async fn statistical_codes(&self, code_type_id: &str) -> Result<Vec<Value>> {
        let query = CqlQuery::field_equals("statisticalCodeTypeId", code_type_id);
        Ok(self
            .client
            .get_array(paths::STATISTICAL_CODES, Some(&query), None, "statisticalCodes")
            .await?)
    }

    async fn put<R: CatalogRecord>(&self, root: &str, record: &R) -> Result<bool> {
        let id = record
            .id()
            .ok_or_else(|| malformed::<R>(ParseError::MissingField("id")))?;
        let path = format!("{root}/{id}");
        Ok(self.client.put(&path, &record.to_value()).await?)
    }
}

/// Path of an item, as used in write-rejection errors.
#[must_use]
pub fn item_path(id: &str) -> String {
    format!("{}/{id}", paths::ITEMS)
}

/// Path of a holding.
#[must_use]
pub fn holding_path(id: &str) -> String {
    format!("{}/{id}", paths::HOLDINGS)
}

/// Path of an instance.
#[must_use]
pub fn instance_path(id: &str) -> String {
    format!("{}/{id}", paths::INSTANCES)
}

const fn malformed<R: CatalogRecord>(source: ParseError) -> LifecycleError {
    LifecycleError::Malformed {
        record: R::KIND,
        source,
    }
}

fn quote_wildcard(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"*{escaped}*\"")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_quote_escapes() {
        assert_eq!(quote_wildcard("39001"), r#""*39001*""#);
        assert_eq!(quote_wildcard(r#"a"b"#), r#""*a\"b*""#);
    }

    #[test]
    fn test_record_paths() {
        assert_eq!(item_path("i1"), "/inventory/items/i1");
        assert_eq!(holding_path("h1"), "/holdings-storage/holdings/h1");
        assert_eq!(instance_path("n1"), "/inventory/instances/n1");
    }
}

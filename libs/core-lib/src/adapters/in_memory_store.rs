use crate::store::{is_safe_identifier, Filter, SelectQuery, Table};
use crate::{CoreError, TableStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// In-memory implementation of the TableStore port.
/// Suitable for testing and single-executable mode.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<DashMap<Table, Vec<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every row currently in `table`.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables.get(&table).map(|rows| rows.clone()).unwrap_or_default()
    }
}

fn check_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Result<(), CoreError> {
    for column in columns {
        if !is_safe_identifier(column) {
            return Err(CoreError::Validation(format!("Invalid column name: {}", column)));
        }
    }
    Ok(())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            // timestamps carry varying fractional digits, so compare them as instants
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[async_trait]
impl TableStore for InMemoryStore {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, CoreError> {
        check_columns(query.filters.iter().map(|f| f.column.as_str()))?;
        let mut rows: Vec<Value> = self
            .tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| matches_all(&query.filters, r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            check_columns([order.column.as_str()])?;
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.descending { ord.reverse() } else { ord }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, CoreError> {
        let Value::Object(map) = &row else {
            return Err(CoreError::Validation("Rows must be JSON objects".into()));
        };
        check_columns(map.keys().map(String::as_str))?;

        let mut rows = self.tables.entry(table).or_default();
        if let Some(id) = map.get("id").filter(|id| !id.is_null()) {
            if rows.iter().any(|r| r.get("id") == Some(id)) {
                return Err(CoreError::AlreadyExists(format!("{} row {}", table, id)));
            }
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>, CoreError> {
        let Value::Object(patch) = patch else {
            return Err(CoreError::Validation("Patch must be a JSON object".into()));
        };
        check_columns(filters.iter().map(|f| f.column.as_str()))?;
        check_columns(patch.keys().map(String::as_str))?;

        let mut updated = Vec::new();
        if let Some(mut rows) = self.tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|r| matches_all(filters, r)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let store = InMemoryStore::new();
        for (id, tenant, at) in [
            ("1", "acme", "2026-01-01T00:00:00Z"),
            ("2", "acme", "2026-01-03T00:00:00.5Z"),
            ("3", "globex", "2026-01-02T00:00:00Z"),
            ("4", "acme", "2026-01-03T00:00:00Z"),
        ] {
            store
                .insert(Table::Deals, json!({"id": id, "tenant_id": tenant, "updated_at": at}))
                .await
                .unwrap();
        }

        let rows = store
            .select(Table::Deals, &SelectQuery::new().eq("tenant_id", "acme").order_desc("updated_at"))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["2", "4", "1"]);

        let limited = store
            .select(Table::Deals, &SelectQuery::new().order_asc("updated_at").limit(1))
            .await
            .unwrap();
        assert_eq!(limited[0]["id"], "1");
    }

    #[tokio::test]
    async fn update_touches_only_matching_rows() {
        let store = InMemoryStore::new();
        store.insert(Table::Deals, json!({"id": "a", "tenant_id": "acme", "stage": "Discovery"})).await.unwrap();
        store.insert(Table::Deals, json!({"id": "b", "tenant_id": "acme", "stage": "Discovery"})).await.unwrap();

        let updated = store
            .update(
                Table::Deals,
                &[Filter::eq("id", "a"), Filter::eq("tenant_id", "acme")],
                json!({"stage": "Proposal"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);

        let rows = store.rows(Table::Deals);
        assert_eq!(rows[0]["stage"], "Proposal");
        assert_eq!(rows[1]["stage"], "Discovery");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryStore::new();
        store.insert(Table::TenantConfig, json!({"id": "x"})).await.unwrap();
        let result = store.insert(Table::TenantConfig, json!({"id": "x"})).await;
        assert!(matches!(result, Err(CoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn unsafe_columns_are_rejected() {
        let store = InMemoryStore::new();
        let result = store
            .select(Table::Users, &SelectQuery::new().eq("email; --", "x"))
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}

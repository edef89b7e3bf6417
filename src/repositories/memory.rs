use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{EntityStore, StoreError, UNIQUE_KEYS};

/// Process-local store used for development and tests.
#[derive(Default)]
pub(crate) struct MemoryEntityStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    rows: HashMap<&'static str, BTreeMap<i64, Value>>,
}

impl MemoryEntityStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(document: &Value, filter: &Value) -> bool {
    match filter {
        Value::Object(expected) => expected
            .iter()
            .all(|(field, value)| document.get(field).is_some_and(|actual| actual == value)),
        _ => false,
    }
}

fn unique_key<'a>(document: &'a Value, fields: &[&str]) -> Option<Vec<&'a Value>> {
    fields.iter().map(|field| document.get(*field).filter(|value| !value.is_null())).collect()
}

/// Whether `data` would duplicate a unique key held by another row of the same kind.
fn violates_unique_key(
    rows: &BTreeMap<i64, Value>,
    kind: &str,
    own_id: Option<i64>,
    data: &Value,
) -> bool {
    UNIQUE_KEYS.iter().filter(|(unique_kind, _)| *unique_kind == kind).any(|(_, fields)| {
        let Some(key) = unique_key(data, fields) else {
            return false;
        };
        rows.iter().any(|(id, other)| {
            Some(*id) != own_id && unique_key(other, fields).is_some_and(|other_key| other_key == key)
        })
    })
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn insert(&self, kind: &'static str, data: Value) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.rows.get(kind) {
            if violates_unique_key(rows, kind, None, &data) {
                return Err(StoreError::Conflict { kind });
            }
        }
        tables.last_id += 1;
        let id = tables.last_id;
        tables.rows.entry(kind).or_default().insert(id, data);
        Ok(id)
    }

    async fn get(&self, kind: &'static str, id: i64) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(kind).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn update(&self, kind: &'static str, id: i64, data: Value) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.rows.get_mut(kind) else {
            return Ok(false);
        };
        if !rows.contains_key(&id) {
            return Ok(false);
        }
        if violates_unique_key(rows, kind, Some(id), &data) {
            return Err(StoreError::Conflict { kind });
        }
        rows.insert(id, data);
        Ok(true)
    }

    async fn delete(&self, kind: &'static str, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables.rows.get_mut(kind).and_then(|rows| rows.remove(&id)).is_some())
    }

    async fn scan(
        &self,
        kind: &'static str,
        filter: Option<Value>,
    ) -> Result<Vec<(i64, Value)>, StoreError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.rows.get(kind) else {
            return Ok(Vec::new());
        };

        Ok(rows
            .iter()
            .filter(|(_, document)| filter.as_ref().map_or(true, |f| matches_filter(document, f)))
            .map(|(id, document)| (*id, document.clone()))
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

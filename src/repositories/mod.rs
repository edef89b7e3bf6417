pub(crate) mod elements;
pub(crate) mod memory;
pub(crate) mod module_elements;
pub(crate) mod postgres;
pub(crate) mod routes;
pub(crate) mod users;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::db::models::{Entity, ModuleElement, Role, Route, User};

/// Field sets that are unique within a kind. Mirrors the unique indexes in `migrations/`.
/// A document missing any field of a set is not constrained by it.
pub(crate) const UNIQUE_KEYS: &[(&str, &[&str])] = &[
    (User::KIND, &["username"]),
    (Route::KIND, &["name"]),
    (ModuleElement::KIND, &["module_id", "element_id"]),
    (Role::KIND, &["name"]),
    (Role::KIND, &["numeric_value"]),
];

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("entity encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{kind} entity conflicts with an existing one")]
    Conflict { kind: &'static str },
}

/// Key-value persistence for JSON entity documents grouped by kind.
///
/// Ids are assigned by the store on insert and are unique across kinds. Inserts and updates
/// that would duplicate a [`UNIQUE_KEYS`] entry fail with [`StoreError::Conflict`]. Scans return
/// documents in ascending id order. A scan filter is a JSON object; a document matches when
/// every top-level field in the filter is present with an equal value.
#[async_trait]
pub(crate) trait EntityStore: Send + Sync {
    async fn insert(&self, kind: &'static str, data: Value) -> Result<i64, StoreError>;

    async fn get(&self, kind: &'static str, id: i64) -> Result<Option<Value>, StoreError>;

    /// Returns `false` when no entity with this id exists.
    async fn update(&self, kind: &'static str, id: i64, data: Value) -> Result<bool, StoreError>;

    /// Returns `false` when no entity with this id exists.
    async fn delete(&self, kind: &'static str, id: i64) -> Result<bool, StoreError>;

    async fn scan(
        &self,
        kind: &'static str,
        filter: Option<Value>,
    ) -> Result<Vec<(i64, Value)>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

fn encode<T: Entity>(entity: &T) -> Result<Value, StoreError> {
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(fields) = &mut value {
        fields.remove("id");
    }
    Ok(value)
}

fn decode<T: Entity>(id: i64, value: Value) -> Result<T, StoreError> {
    let mut entity: T = serde_json::from_value(value)?;
    entity.set_id(id);
    Ok(entity)
}

/// Inserts the entity and writes the assigned id back into it.
pub(crate) async fn create<T: Entity>(
    store: &dyn EntityStore,
    entity: &mut T,
) -> Result<(), StoreError> {
    let id = store.insert(T::KIND, encode(entity)?).await?;
    entity.set_id(id);
    Ok(())
}

pub(crate) async fn find<T: Entity>(
    store: &dyn EntityStore,
    id: i64,
) -> Result<Option<T>, StoreError> {
    match store.get(T::KIND, id).await? {
        Some(value) => Ok(Some(decode(id, value)?)),
        None => Ok(None),
    }
}

pub(crate) async fn save<T: Entity>(store: &dyn EntityStore, entity: &T) -> Result<bool, StoreError> {
    store.update(T::KIND, entity.id(), encode(entity)?).await
}

pub(crate) async fn remove<T: Entity>(store: &dyn EntityStore, id: i64) -> Result<bool, StoreError> {
    store.delete(T::KIND, id).await
}

pub(crate) async fn list<T: Entity>(store: &dyn EntityStore) -> Result<Vec<T>, StoreError> {
    store.scan(T::KIND, None).await?.into_iter().map(|(id, value)| decode(id, value)).collect()
}

pub(crate) async fn list_where<T: Entity>(
    store: &dyn EntityStore,
    filter: Value,
) -> Result<Vec<T>, StoreError> {
    store
        .scan(T::KIND, Some(filter))
        .await?
        .into_iter()
        .map(|(id, value)| decode(id, value))
        .collect()
}

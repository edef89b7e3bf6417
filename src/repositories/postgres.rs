use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use super::{EntityStore, StoreError};

#[derive(Clone)]
pub(crate) struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(kind: &'static str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict { kind }
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn insert(&self, kind: &'static str, data: Value) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>("INSERT INTO entities (kind, data) VALUES ($1, $2) RETURNING id")
            .bind(kind)
            .bind(Json(data))
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_write_error(kind, err))
    }

    async fn get(&self, kind: &'static str, id: i64) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_scalar::<_, Json<Value>>(
            "SELECT data FROM entities WHERE kind = $1 AND id = $2",
        )
        .bind(kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(value)| value))
    }

    async fn update(&self, kind: &'static str, id: i64, data: Value) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE entities SET data = $3, updated_at = NOW() WHERE kind = $1 AND id = $2",
        )
        .bind(kind)
        .bind(id)
        .bind(Json(data))
        .execute(&self.pool)
        .await
        .map_err(|err| map_write_error(kind, err))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, kind: &'static str, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM entities WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(
        &self,
        kind: &'static str,
        filter: Option<Value>,
    ) -> Result<Vec<(i64, Value)>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, Json<Value>)>(
            "SELECT id, data FROM entities
             WHERE kind = $1 AND ($2::jsonb IS NULL OR data @> $2::jsonb)
             ORDER BY id",
        )
        .bind(kind)
        .bind(filter.map(Json))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id, Json(value))| (id, value)).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

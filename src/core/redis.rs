use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, ErrorKind, RedisError};
use tokio::sync::RwLock;

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    pub(crate) async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), RedisError> {
        let mut manager = self.connection().await?;
        cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut manager)
            .await
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, RedisError> {
        let mut manager = self.connection().await?;
        cmd("GET").arg(key).query_async::<_, Option<String>>(&mut manager).await
    }

    pub(crate) async fn delete(&self, key: &str) -> Result<bool, RedisError> {
        let mut manager = self.connection().await?;
        let removed = cmd("DEL").arg(key).query_async::<_, i64>(&mut manager).await?;
        Ok(removed > 0)
    }

    async fn connection(&self) -> Result<ConnectionManager, RedisError> {
        let manager = { self.manager.read().await.clone() };
        manager.ok_or_else(|| RedisError::from((ErrorKind::IoError, "redis is not connected")))
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};

    #[tokio::test]
    async fn commands_fail_before_connect() {
        let redis = RedisHandle::new("redis://127.0.0.1:6379/0".to_string());

        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
        assert!(redis.get("session:missing").await.is_err());
        assert!(redis.set_ex("session:missing", "{}", 10).await.is_err());
    }
}

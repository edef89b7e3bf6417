pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::config::{SessionBackend, Settings, StoreBackend};
use crate::core::{redis::RedisHandle, state::AppState, telemetry};
use crate::repositories::{memory::MemoryEntityStore, postgres::PgEntityStore, EntityStore};
use crate::services::sessions::{
    MemorySessionStore, RedisSessionStore, SessionManager, SessionStore,
};

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn EntityStore>> {
    match settings.database().backend {
        StoreBackend::Postgres => {
            let db_pool = db::init_pool(settings).await?;
            db::run_migrations(&db_pool).await?;
            tracing::info!("Postgres store ready");
            Ok(Arc::new(PgEntityStore::new(db_pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryEntityStore::new()))
        }
    }
}

async fn open_sessions(settings: &Settings) -> (Arc<dyn SessionStore>, Option<RedisHandle>) {
    match settings.session().backend {
        SessionBackend::Redis => {
            let redis = RedisHandle::new(settings.redis().redis_url());
            if let Err(err) = redis.connect().await {
                tracing::error!(error = %err, "Failed to connect to Redis; sessions will fail until it is reachable");
            } else {
                tracing::info!("Redis connected successfully");
            }
            let store: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis.clone()));
            (store, Some(redis))
        }
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory sessions; logins do not survive a restart");
            let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            (store, None)
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let store = open_store(&settings).await?;
    let (session_store, redis) = open_sessions(&settings).await;
    let sessions = SessionManager::new(session_store, settings.session().ttl_seconds);

    let state = AppState::new(settings, store, sessions, redis.clone());
    core::bootstrap::prepare(&state, &api::router::route_identities()).await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        store = state.settings().database().backend.as_str(),
        sessions = state.settings().session().backend.as_str(),
        "Coursekit API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    if let Some(redis) = redis {
        redis.disconnect().await;
        tracing::info!("Redis disconnected");
    }

    result?;

    Ok(())
}

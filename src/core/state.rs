use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::repositories::EntityStore;
use crate::services::grading::GradingOptions;
use crate::services::permissions::RoleRegistry;
use crate::services::sessions::SessionManager;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    store: Arc<dyn EntityStore>,
    sessions: SessionManager,
    roles: RoleRegistry,
    redis: Option<RedisHandle>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        store: Arc<dyn EntityStore>,
        sessions: SessionManager,
        redis: Option<RedisHandle>,
    ) -> Self {
        Self {
            inner: Arc::new(InnerState {
                settings,
                store,
                sessions,
                roles: RoleRegistry::new(),
                redis,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn store(&self) -> &dyn EntityStore {
        self.inner.store.as_ref()
    }

    pub(crate) fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub(crate) fn roles(&self) -> &RoleRegistry {
        &self.inner.roles
    }

    /// Present only when sessions live in Redis.
    pub(crate) fn redis(&self) -> Option<&RedisHandle> {
        self.inner.redis.as_ref()
    }

    pub(crate) fn grading_options(&self) -> GradingOptions {
        GradingOptions::from_settings(self.settings().grading())
    }
}

mod parsing;
mod settings;
mod types;

pub(crate) use types::{
    GradingSettings, MissingElementPolicy, SessionBackend, Settings, StoreBackend,
    MAX_SESSION_TTL_SECONDS,
};

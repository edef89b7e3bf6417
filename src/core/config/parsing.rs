use std::env;

use super::types::{
    ConfigError, Environment, MissingElementPolicy, SessionBackend, StoreBackend,
    MAX_SESSION_TTL_SECONDS,
};

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8080"];

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_percentage(field: &'static str, value: String) -> Result<i32, ConfigError> {
    match value.parse::<i32>() {
        Ok(parsed) if (0..=100).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

pub(super) fn parse_session_ttl(value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(parsed) if (1..=MAX_SESSION_TTL_SECONDS).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field: "SESSION_TTL_SECONDS", value }),
    }
}

pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

pub(super) fn parse_store_backend(value: String) -> Result<StoreBackend, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        _ => Err(ConfigError::InvalidValue { field: "STORE_BACKEND", value }),
    }
}

pub(super) fn parse_session_backend(value: String) -> Result<SessionBackend, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "redis" => Ok(SessionBackend::Redis),
        "memory" => Ok(SessionBackend::Memory),
        _ => Err(ConfigError::InvalidValue { field: "SESSION_BACKEND", value }),
    }
}

pub(super) fn parse_missing_element_policy(
    value: String,
) -> Result<MissingElementPolicy, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "exclude" | "skip" => Ok(MissingElementPolicy::Exclude),
        "penalize" => Ok(MissingElementPolicy::Penalize),
        "reject" => Ok(MissingElementPolicy::Reject),
        _ => Err(ConfigError::InvalidValue { field: "GRADING_MISSING_ELEMENTS", value }),
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

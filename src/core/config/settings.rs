use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_missing_element_policy, parse_percentage, parse_session_backend, parse_session_ttl,
    parse_store_backend, parse_u16, parse_u32,
};
use super::types::{
    AdminSettings, ConfigError, CorsSettings, DatabaseSettings, GradingSettings, RedisSettings,
    RuntimeSettings, ServerHost, ServerPort, ServerSettings, SessionBackend, SessionSettings,
    Settings, StoreBackend, TelemetrySettings,
};

const SESSION_COOKIE_NAME: &str = "session_token";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("COURSEKIT_HOST", "0.0.0.0");
        let port = env_or_default("COURSEKIT_PORT", "8000");

        let environment = parse_environment(
            env_optional("COURSEKIT_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config =
            env_optional("COURSEKIT_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let store_backend = parse_store_backend(env_or_default("STORE_BACKEND", "postgres"))?;
        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "coursekit");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "coursekit");
        let database_url = env_optional("DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default("DATABASE_MAX_CONNECTIONS", "10"),
        )?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let session_backend = parse_session_backend(env_or_default("SESSION_BACKEND", "redis"))?;
        let session_ttl_seconds = parse_session_ttl(env_or_default("SESSION_TTL_SECONDS", "360"))?;
        let session_cookie_secure =
            env_optional("SESSION_COOKIE_SECURE").map(|value| parse_bool(&value)).unwrap_or(false);

        let missing_elements =
            parse_missing_element_policy(env_or_default("GRADING_MISSING_ELEMENTS", "exclude"))?;
        let text_regex_matching = env_optional("GRADING_TEXT_REGEX_MATCHING")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let reveal_answers_in_results = env_optional("GRADING_REVEAL_ANSWERS_IN_RESULTS")
            .map(|value| parse_bool(&value))
            .unwrap_or(true);
        let quiz_passing_threshold = parse_percentage(
            "QUIZ_PASSING_THRESHOLD",
            env_or_default("QUIZ_PASSING_THRESHOLD", "70"),
        )?;

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("COURSEKIT_LOG_LEVEL", "info");
        let json = env_optional("COURSEKIT_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                backend: store_backend,
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            session: SessionSettings {
                backend: session_backend,
                ttl_seconds: session_ttl_seconds,
                cookie_name: SESSION_COOKIE_NAME.to_string(),
                cookie_secure: session_cookie_secure,
            },
            grading: GradingSettings {
                missing_elements,
                text_regex_matching,
                reveal_answers_in_results,
                quiz_passing_threshold,
            },
            admin: AdminSettings { first_superuser_username, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub(crate) fn grading(&self) -> &GradingSettings {
        &self.grading
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.backend == StoreBackend::Memory {
            return Err(ConfigError::InvalidValue {
                field: "STORE_BACKEND",
                value: StoreBackend::Memory.as_str().to_string(),
            });
        }
        if self.session.backend == SessionBackend::Memory {
            return Err(ConfigError::InvalidValue {
                field: "SESSION_BACKEND",
                value: SessionBackend::Memory.as_str().to_string(),
            });
        }
        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}

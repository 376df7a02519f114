use serde::{Deserialize, Serialize};

use crate::entity::session_state::DEFAULT_TABLE_NAME;
use crate::error::{Error, Result};

/// Session state store configuration
///
/// Built once at startup and handed to [`SeaOrmStore::connect`](crate::SeaOrmStore::connect)
/// and [`SessionStateStore::new`](crate::SessionStateStore::new).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionStateConfig {
    /// Database connection URL
    #[serde(default)]
    pub database_url: String,

    /// Table holding the session records
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Application scope; sessions of different applications never collide
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Idle timeout (in minutes) used when the host does not supply one
    #[serde(default = "default_timeout_minutes")]
    pub default_timeout_minutes: i32,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connect and pool-acquire timeout (in seconds)
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl Default for SessionStateConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            table_name: default_table_name(),
            application_name: default_application_name(),
            default_timeout_minutes: default_timeout_minutes(),
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }
}

impl SessionStateConfig {
    /// Defaults for everything except the database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// Overrides the session table name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Sets the application scope sessions are stored under.
    pub fn with_application_name(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = application_name.into();
        self
    }

    /// Sets the idle timeout handed to sessions created without one.
    pub fn with_default_timeout_minutes(mut self, minutes: i32) -> Self {
        self.default_timeout_minutes = minutes;
        self
    }

    /// Load configuration from environment variables
    ///
    /// Reads `SESSION_STATE_DATABASE_URL` (falling back to `DATABASE_URL`),
    /// `SESSION_STATE_TABLE`, `SESSION_STATE_APPLICATION`,
    /// `SESSION_STATE_TIMEOUT_MINUTES`, `SESSION_STATE_MAX_CONNECTIONS` and
    /// `SESSION_STATE_CONNECT_TIMEOUT_SECONDS`. Unparseable numbers keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("SESSION_STATE_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            config.database_url = url;
        }

        if let Some(table) = lookup("SESSION_STATE_TABLE") {
            config.table_name = table;
        }

        if let Some(application) = lookup("SESSION_STATE_APPLICATION") {
            config.application_name = application;
        }

        if let Some(timeout) = lookup("SESSION_STATE_TIMEOUT_MINUTES") {
            match timeout.parse() {
                Ok(minutes) => config.default_timeout_minutes = minutes,
                Err(_) => tracing::warn!(value = %timeout, "ignoring invalid SESSION_STATE_TIMEOUT_MINUTES"),
            }
        }

        if let Some(max) = lookup("SESSION_STATE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.max_connections = max;
            }
        }

        if let Some(seconds) = lookup("SESSION_STATE_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(seconds) = seconds.parse() {
                config.connect_timeout_seconds = seconds;
            }
        }

        config
    }

    /// Rejects configurations that can never reach a store.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Configuration(
                "database url cannot be blank".to_string(),
            ));
        }
        if self.table_name.trim().is_empty() {
            return Err(Error::Configuration("table name cannot be blank".to_string()));
        }
        if self.default_timeout_minutes <= 0 {
            return Err(Error::Configuration(format!(
                "default timeout must be positive, got {} minutes",
                self.default_timeout_minutes
            )));
        }
        Ok(())
    }
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_application_name() -> String {
    "/".to_string()
}

fn default_timeout_minutes() -> i32 {
    20
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

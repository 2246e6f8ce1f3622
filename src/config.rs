//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Application configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Sessions expire after this much inactivity.
    pub session_idle_timeout: Duration,
    /// Mark the session cookie `Secure` (requires HTTPS).
    pub secure_cookies: bool,
    /// Create the demo account with sample tags and todos at startup.
    pub seed_demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/todos.db"),
            port: 8080,
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            secure_cookies: false,
            seed_demo: false,
        }
    }
}

impl AppConfig {
    /// Build the config from `TODOS_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = get("TODOS_DB_PATH").filter(|s| !s.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(port) = get("TODOS_PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "TODOS_PORT".into(),
                message: format!("{e}"),
            })?;
        }

        if let Some(minutes) = get("TODOS_SESSION_IDLE_MIN") {
            let minutes: u64 = minutes.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "TODOS_SESSION_IDLE_MIN".into(),
                message: format!("{e}"),
            })?;
            if minutes == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "TODOS_SESSION_IDLE_MIN".into(),
                    message: "must be at least 1".into(),
                });
            }
            let secs = minutes.checked_mul(60).ok_or_else(|| ConfigError::InvalidValue {
                key: "TODOS_SESSION_IDLE_MIN".into(),
                message: format!("{minutes} minutes is out of range"),
            })?;
            config.session_idle_timeout = Duration::from_secs(secs);
        }

        if let Some(secure) = get("TODOS_SECURE_COOKIES") {
            config.secure_cookies = is_truthy(&secure);
        }

        if let Some(seed) = get("TODOS_SEED") {
            config.seed_demo = is_truthy(&seed);
        }

        Ok(config)
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

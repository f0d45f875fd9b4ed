use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_REFRESH_INTERVAL: &str = "FLAGENT_EVALCACHE_REFRESHINTERVAL";
pub const ENV_REFRESH_TIMEOUT: &str = "FLAGENT_EVALCACHE_REFRESHTIMEOUT";
pub const ENV_DB_DRIVER: &str = "FLAGENT_DB_DBDRIVER";
pub const ENV_DB_CONNECTION_STR: &str = "FLAGENT_DB_DBCONNECTIONSTR";
pub const ENV_EVAL_ONLY_MODE: &str = "FLAGENT_EVAL_ONLY_MODE";

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(59);
const DEFAULT_DRIVER: &str = "sqlite3";
const DEFAULT_CONNECTION_STR: &str = "flagent.sqlite";

/// Where a serving-only deployment reads its flags from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Driver {
    /// A local JSON document; `connection_str` is the path.
    JsonFile,
    /// A remote JSON document; `connection_str` is the URL.
    JsonHttp,
    /// Any persistence driver (sqlite3, postgres, ...). Only valid outside eval-only mode.
    Database(String),
}

impl Driver {
    pub fn parse(s: &str) -> Driver {
        match s {
            "json_file" => Driver::JsonFile,
            "json_http" => Driver::JsonHttp,
            other => Driver::Database(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Driver::JsonFile => "json_file",
            Driver::JsonHttp => "json_http",
            Driver::Database(name) => name,
        }
    }

    fn is_document(&self) -> bool {
        matches!(self, Driver::JsonFile | Driver::JsonHttp)
    }
}

/// Configuration for an [crate::EvalCache], resolved once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub refresh_interval: Duration,
    pub refresh_timeout: Duration,
    pub driver: Driver,
    pub connection_str: String,
    pub eval_only_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            driver: Driver::Database(DEFAULT_DRIVER.to_string()),
            connection_str: DEFAULT_CONNECTION_STR.to_string(),
            eval_only_mode: false,
        }
    }
}

impl CacheConfig {
    /// Serving-only configuration reading a local JSON document.
    pub fn json_file(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::JsonFile,
            connection_str: path.into(),
            eval_only_mode: true,
            ..Self::default()
        }
    }

    /// Serving-only configuration reading a remote JSON document.
    pub fn json_http(url: impl Into<String>) -> Self {
        Self {
            driver: Driver::JsonHttp,
            connection_str: url.into(),
            eval_only_mode: true,
            ..Self::default()
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Rejects settings the refresh task cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: ENV_REFRESH_INTERVAL,
                value: format!("{:?}", self.refresh_interval),
                reason: "refresh interval must be positive".to_string(),
            });
        }
        if self.refresh_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: ENV_REFRESH_TIMEOUT,
                value: format!("{:?}", self.refresh_timeout),
                reason: "refresh timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Reads the configuration from `FLAGENT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_REFRESH_INTERVAL) {
            config.refresh_interval = parse_duration(ENV_REFRESH_INTERVAL, &v)?;
        }
        if let Some(v) = lookup(ENV_REFRESH_TIMEOUT) {
            config.refresh_timeout = parse_duration(ENV_REFRESH_TIMEOUT, &v)?;
        }
        if let Some(v) = lookup(ENV_DB_DRIVER) {
            config.driver = Driver::parse(v.trim());
        }
        if let Some(v) = lookup(ENV_DB_CONNECTION_STR) {
            config.connection_str = v;
        }
        config.eval_only_mode = match lookup(ENV_EVAL_ONLY_MODE) {
            Some(v) => parse_bool(ENV_EVAL_ONLY_MODE, &v)?,
            None => config.driver.is_document(),
        };

        config.validate()?;

        Ok(config)
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Accepts a bare number of seconds or anything `humantime` understands (`500ms`, `3s`, `2m`,
/// `1h 30m`, ...).
pub(crate) fn parse_duration(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).map_err(|e| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal configuration problems, raised while constructing a cache or fetcher.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to create evaluation cache fetcher. DBDriver:{0} is not supported")]
    UnsupportedDriver(String),

    #[error("either a flag store or a fetcher must be provided")]
    MissingSource,

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Transient failures of a single fetch. The cache logs these and keeps serving its last good
/// snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("JSON file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flags document from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load flags from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("flag store query failed: {0}")]
    Store(#[from] StoreError),

    #[error("fetch did not complete within {0:?}")]
    Timeout(Duration),
}

/// Error reported by a [crate::FlagStore] implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Rejection of a malformed authoring request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("{field} must not exceed {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{0} can only contain lowercase letters, numbers, hyphens, and underscores")]
    InvalidCharacters(&'static str),

    #[error("Invalid constraint operator: {0}")]
    InvalidOperator(String),

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("Distribution percentages must add up to 100% (currently at {0}%)")]
    DistributionSum(i64),
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn messages() {
        assert_that!(ConfigError::UnsupportedDriver("mysql".into()).to_string()).is_equal_to(
            "failed to create evaluation cache fetcher. DBDriver:mysql is not supported".to_string(),
        );
        assert_that!(FetchError::FileNotFound(PathBuf::from("/tmp/flags.json")).to_string())
            .is_equal_to("JSON file not found: /tmp/flags.json".to_string());
        assert_that!(ValidationError::DistributionSum(90).to_string())
            .is_equal_to("Distribution percentages must add up to 100% (currently at 90%)".to_string());
    }

    #[test]
    fn store_errors_convert() {
        let err: FetchError = StoreError::new("connection refused").into();
        assert_that!(err.to_string())
            .is_equal_to("flag store query failed: connection refused".to_string());
    }

    #[test]
    fn store_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = StoreError::with_source("query failed", io);
        assert_that!(std::error::Error::source(&err).map(|s| s.to_string()))
            .contains_value("socket closed".to_string());
    }
}

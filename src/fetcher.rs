use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};

use crate::config::{CacheConfig, Driver};
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::export::ExportDocument;
use crate::flag::Flag;
use crate::store::FlagStore;

/// Fetcher produces the full, hydrated list of flags a new snapshot is built from.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self) -> FetchResult<Vec<Flag>>;
}

/// Creates the fetcher selected by `config`.
///
/// In eval-only mode the driver must be `json_file` or `json_http`; otherwise flags come from the
/// flag store, which must then be provided.
pub fn create_fetcher(
    config: &CacheConfig,
    store: Option<Arc<dyn FlagStore>>,
) -> Result<Arc<dyn Fetcher>, ConfigError> {
    if !config.eval_only_mode {
        let store = store.ok_or(ConfigError::MissingSource)?;
        return Ok(Arc::new(StoreFetcher::new(store)));
    }

    match &config.driver {
        Driver::JsonFile => Ok(Arc::new(JsonFileFetcher::new(&config.connection_str))),
        Driver::JsonHttp => Ok(Arc::new(JsonHttpFetcher::new(
            &config.connection_str,
            config.refresh_timeout,
        )?)),
        Driver::Database(name) => Err(ConfigError::UnsupportedDriver(name.clone())),
    }
}

/// Reads every flag from the persistence layer.
pub struct StoreFetcher {
    store: Arc<dyn FlagStore>,
}

impl StoreFetcher {
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Fetcher for StoreFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Flag>> {
        Ok(self.store.find_all_flags().await?)
    }
}

/// Reads a local JSON document of the [ExportDocument] shape.
pub struct JsonFileFetcher {
    path: PathBuf,
}

impl JsonFileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Fetcher for JsonFileFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Flag>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("Failed to load flags from JSON file: {}", self.path.display());
                return Err(FetchError::FileNotFound(self.path.clone()));
            }
            Err(source) => {
                error!("Failed to load flags from JSON file: {}", self.path.display());
                return Err(FetchError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document = ExportDocument::from_slice(&bytes).map_err(|source| {
            error!("Failed to parse flags from JSON file: {}", self.path.display());
            FetchError::Parse {
                origin: self.path.display().to_string(),
                source,
            }
        })?;

        debug!(
            "loaded {} flags from {}",
            document.flags.len(),
            self.path.display()
        );
        Ok(document.into_flags())
    }
}

/// Reads a remote JSON document of the [ExportDocument] shape with a single GET.
pub struct JsonHttpFetcher {
    url: String,
    client: reqwest::Client,
}

impl JsonHttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                name: "http client",
                value: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Fetcher for JsonHttpFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Flag>> {
        let http_error = |source| {
            error!("Failed to load flags from HTTP URL: {}", self.url);
            FetchError::Http {
                url: self.url.clone(),
                source,
            }
        };

        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(http_error)?
            .bytes()
            .await
            .map_err(http_error)?;

        let document = ExportDocument::from_slice(&body).map_err(|source| {
            error!("Failed to parse flags from HTTP URL: {}", self.url);
            FetchError::Parse {
                origin: self.url.clone(),
                source,
            }
        })?;

        debug!("loaded {} flags from {}", document.flags.len(), self.url);
        Ok(document.into_flags())
    }
}

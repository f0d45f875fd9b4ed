use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::CacheConfig;
use crate::error::{ConfigError, FetchError};
use crate::export::ExportDocument;
use crate::fetcher::{create_fetcher, Fetcher};
use crate::flag::{Flag, FlagId};
use crate::snapshot::{Snapshot, TagMatch};
use crate::store::FlagStore;

/// Identifies a flag either by numeric id or by key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlagRef {
    Id(FlagId),
    Key(String),
}

impl From<FlagId> for FlagRef {
    fn from(id: FlagId) -> Self {
        FlagRef::Id(id)
    }
}

impl From<&str> for FlagRef {
    fn from(key: &str) -> Self {
        FlagRef::Key(key.to_string())
    }
}

impl From<String> for FlagRef {
    fn from(key: String) -> Self {
        FlagRef::Key(key)
    }
}

/// EvalCache serves flag lookups from an in-memory snapshot that a background task periodically
/// replaces with a freshly fetched one.
///
/// Readers never block: each lookup loads the current snapshot and works on it, so a concurrent
/// refresh is either entirely visible or not at all. The handle is cheap to clone and every clone
/// shares the same snapshot and refresh task.
#[derive(Clone)]
pub struct EvalCache {
    inner: Arc<Inner>,
}

struct Inner {
    snapshot: ArcSwap<Snapshot>,
    fetcher: Arc<dyn Fetcher>,
    config: CacheConfig,
    refresh_lock: tokio::sync::Mutex<()>,
    task: Mutex<Option<RefreshTask>>,
}

struct RefreshTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl EvalCache {
    /// Creates a cache reading from `fetcher` if given, otherwise from the fetcher `config` selects
    /// over `store`.
    pub fn new(
        config: CacheConfig,
        store: Option<Arc<dyn FlagStore>>,
        fetcher: Option<Arc<dyn Fetcher>>,
    ) -> Result<Self, ConfigError> {
        let fetcher = match fetcher {
            Some(fetcher) => fetcher,
            None => create_fetcher(&config, store)?,
        };
        Self::with_fetcher(config, fetcher)
    }

    /// Fails if `config` has a zero refresh interval or timeout.
    pub fn with_fetcher(
        config: CacheConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                snapshot: ArcSwap::from_pointee(Snapshot::empty()),
                fetcher,
                config,
                refresh_lock: tokio::sync::Mutex::new(()),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn with_store(config: CacheConfig, store: Arc<dyn FlagStore>) -> Result<Self, ConfigError> {
        Self::new(config, Some(store), None)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Spawns the periodic refresh task on the current Tokio runtime. The first refresh runs
    /// immediately. Does nothing if the task is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.task_state();
        if matches!(&*task, Some(t) if !t.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(
            Arc::downgrade(&self.inner),
            self.inner.config.refresh_interval,
            cancel.clone(),
        ));
        info!(
            "evaluation cache started, refreshing every {:?}",
            self.inner.config.refresh_interval
        );
        *task = Some(RefreshTask { handle, cancel });
    }

    /// Stops scheduling refreshes. A refresh already in flight runs to completion; the current
    /// snapshot remains available.
    pub fn stop(&self) {
        if let Some(task) = self.inner.task_state().take() {
            task.cancel.cancel();
            info!("evaluation cache stopped");
        }
    }

    /// Fetches and publishes a new snapshot, waiting for any refresh already in progress first.
    ///
    /// On failure the previous snapshot keeps being served.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.fetch_and_publish().await
    }

    /// The current snapshot, for callers that need several lookups to agree with each other.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.load_full()
    }

    /// Whether at least one refresh has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.last_refreshed_at().is_some()
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.load().fetched_at()
    }

    pub fn get_by_flag_key_or_id(&self, flag: impl Into<FlagRef>) -> Option<Arc<Flag>> {
        let snapshot = self.inner.snapshot.load();
        match flag.into() {
            FlagRef::Id(id) => snapshot.get_by_id(id),
            FlagRef::Key(key) => snapshot.get_by_key(&key),
        }
    }

    /// Enabled flags matching `tags` under `mode`, ordered by id.
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S], mode: TagMatch) -> Vec<Arc<Flag>> {
        self.inner.snapshot.load().get_by_tags(tags, mode)
    }

    /// Every cached flag, ordered by id.
    pub fn export(&self) -> ExportDocument {
        self.inner.snapshot.load().to_export()
    }
}

impl Inner {
    fn task_state(&self) -> MutexGuard<'_, Option<RefreshTask>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Callers must hold `refresh_lock`.
    async fn fetch_and_publish(&self) -> Result<(), FetchError> {
        let timeout = self.config.refresh_timeout;
        let flags = tokio::time::timeout(timeout, self.fetcher.fetch())
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        let snapshot = Snapshot::from_flags(flags, Utc::now());
        debug!("evaluation cache reloaded with {} flags", snapshot.len());
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }
}

async fn refresh_loop(inner: Weak<Inner>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // The last handle is gone; nobody can read the snapshot anymore.
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let guard = inner.refresh_lock.try_lock();
        match guard {
            Ok(_) => {
                if let Err(e) = inner.fetch_and_publish().await {
                    error!("failed to refresh evaluation cache: {}", e);
                }
            }
            Err(_) => debug!("evaluation cache refresh already in progress, skipping tick"),
        }
    }
}

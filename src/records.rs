use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::storage::KvStore;

pub const USERS: &str = "users";
pub const TASKS: &str = "tasks";
pub const CATEGORIES: &str = "categories";
pub const CURRENT_USER: &str = "currentUser";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("No user logged in")]
    NoUserLoggedIn,

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("{0}")]
    InvalidInput(String),

    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),

    #[error("corrupt value under key {key:?}: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// JSON-array collections over a [`KvStore`].
///
/// Every read-modify-write of a collection runs under that collection's
/// lock, so two writers on the same key never interleave. Each adapter call
/// is bounded by `timeout`.
pub struct RecordStore {
    kv: Arc<dyn KvStore>,
    timeout: Duration,
    users: Mutex<()>,
    tasks: Mutex<()>,
    categories: Mutex<()>,
    last_id: StdMutex<i64>,
}

impl RecordStore {
    pub fn new(kv: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self {
            kv,
            timeout,
            users: Mutex::new(()),
            tasks: Mutex::new(()),
            categories: Mutex::new(()),
            last_id: StdMutex::new(0),
        }
    }

    /// Creates the users and tasks collections when absent. Never overwrites.
    pub async fn initialize(&self) -> StoreResult<()> {
        for key in [USERS, TASKS] {
            let _guard = self.lock(key).await;
            if self.get_raw(key).await?.is_none() {
                self.set_raw(key, "[]".to_string()).await?;
                info!(key, "initialized empty collection");
            }
        }
        Ok(())
    }

    /// Lock for a collection key. Slots such as `currentUser` are single
    /// writes and have no lock.
    pub(crate) async fn lock(&self, key: &'static str) -> MutexGuard<'_, ()> {
        match key {
            USERS => self.users.lock().await,
            TASKS => self.tasks.lock().await,
            CATEGORIES => self.categories.lock().await,
            other => unreachable!("{other:?} is not a collection"),
        }
    }

    /// Reads a collection. A missing key or JSON `null` is an empty collection.
    pub(crate) async fn load<T: DeserializeOwned>(&self, key: &'static str) -> StoreResult<Vec<T>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(Vec::new());
        };
        let items: Option<Vec<T>> = serde_json::from_str(&raw).map_err(|source| {
            error!(key, error = %source, "collection failed to decode");
            StoreError::Corrupt { key, source }
        })?;
        Ok(items.unwrap_or_default())
    }

    pub(crate) async fn save<T: Serialize>(&self, key: &'static str, items: &[T]) -> StoreResult<()> {
        let raw = serde_json::to_string(items).map_err(|source| StoreError::Corrupt { key, source })?;
        self.set_raw(key, raw).await?;
        debug!(key, len = items.len(), "collection saved");
        Ok(())
    }

    pub(crate) async fn load_slot<T: DeserializeOwned>(&self, key: &'static str) -> StoreResult<Option<T>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map_err(|source| {
            error!(key, error = %source, "slot failed to decode");
            StoreError::Corrupt { key, source }
        })
    }

    pub(crate) async fn save_slot<T: Serialize>(&self, key: &'static str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Corrupt { key, source })?;
        self.set_raw(key, raw).await
    }

    pub(crate) async fn clear_slot(&self, key: &'static str) -> StoreResult<()> {
        let kv = Arc::clone(&self.kv);
        self.bounded(key, "remove", async move { kv.remove(key).await })
            .await
    }

    /// Next record id: wall-clock millis, bumped past the last id this store
    /// issued and past `floor` (the largest id already in the collection).
    pub(crate) fn next_id(&self, floor: i64) -> i64 {
        let now = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let mut last = match self.last_id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = now.max(*last + 1).max(floor + 1);
        *last = id;
        id
    }

    async fn get_raw(&self, key: &'static str) -> StoreResult<Option<String>> {
        let kv = Arc::clone(&self.kv);
        self.bounded(key, "get", async move { kv.get(key).await })
            .await
    }

    async fn set_raw(&self, key: &'static str, value: String) -> StoreResult<()> {
        let kv = Arc::clone(&self.kv);
        self.bounded(key, "set", async move { kv.set(key, value).await })
            .await
    }

    async fn bounded<T, F>(&self, key: &'static str, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(key, op, error = %e, "kv adapter failed");
                Err(StoreError::StorageUnavailable(e))
            }
            Err(_) => {
                error!(key, op, timeout_ms = self.timeout.as_millis() as u64, "kv adapter timed out");
                Err(StoreError::StorageUnavailable(anyhow::anyhow!(
                    "{op} {key:?} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

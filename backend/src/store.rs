use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Failed to acquire store lock")]
    LockFailed,
    #[error("Version conflict on {0}")]
    VersionConflict(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for shared::Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::VersionConflict(key) => shared::Error::with_details(
                shared::ErrorCode::Conflict,
                "Concurrent update, please retry",
                key,
            ),
            StoreError::NotFound(key) => shared::Error::with_details(
                shared::ErrorCode::NotFound,
                "Record not found",
                key,
            ),
            other => shared::Error::storage(other.to_string()),
        }
    }
}

/// A stored value together with its write version. Versions start at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub version: u64,
    pub value: Value,
}

impl Record {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

/// Keyed record store with point writes, compare-and-swap and change
/// notifications.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError>;

    /// All records whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<Record>, StoreError>;

    /// Unconditional write. Returns the new version.
    async fn put(&self, key: &str, value: Value) -> Result<u64, StoreError>;

    /// Writes only if the stored version equals `expected`, where `None`
    /// means the key must not exist yet. Returns the new version or
    /// `VersionConflict`.
    async fn compare_and_swap(&self, key: &str, expected: Option<u64>, value: Value) -> Result<u64, StoreError>;

    /// Receiver of changed keys.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

pub type SharedStore = Arc<dyn Store>;

pub async fn get_as<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<(T, u64)>, StoreError> {
    match store.get(key).await? {
        Some(record) => Ok(Some((record.decode()?, record.version))),
        None => Ok(None),
    }
}

pub async fn list_as<T: DeserializeOwned>(store: &dyn Store, prefix: &str) -> Result<Vec<T>, StoreError> {
    store.list(prefix).await?.iter().map(Record::decode).collect()
}

pub async fn put_as<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<u64, StoreError> {
    store.put(key, serde_json::to_value(value)?).await
}

pub async fn swap_as<T: Serialize>(store: &dyn Store, key: &str, expected: Option<u64>, value: &T) -> Result<u64, StoreError> {
    store.compare_and_swap(key, expected, serde_json::to_value(value)?).await
}

/// Snapshots of every record under `prefix`: one immediately, then one per
/// change under the prefix. Dropping the stream unregisters it.
pub fn watch(store: SharedStore, prefix: impl Into<String>) -> BoxStream<'static, Result<Vec<Record>, StoreError>> {
    let prefix = prefix.into();
    let receiver = store.subscribe();

    stream::unfold(Some((store, prefix, receiver, true)), |state| async move {
        let (store, prefix, mut receiver, initial) = state?;
        if !initial {
            loop {
                match receiver.recv().await {
                    Ok(key) if key.starts_with(&prefix) => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(prefix = %prefix, skipped, "Watch lagged, re-listing");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
        let snapshot = store.list(&prefix).await;
        let next = match snapshot {
            Ok(_) => Some((store, prefix, receiver, false)),
            Err(ref e) => {
                warn!(prefix = %prefix, "Watch snapshot failed: {}", e);
                None
            }
        };
        Some((snapshot, next))
    })
    .boxed()
}

/// Record layout. Club data lives under `club/{club}/`; the open-poll
/// markers of all clubs share `open-poll/` so the close sweep can scan them
/// without touching anything else.
pub mod keys {
    use super::*;

    pub const ROOT: &str = "club/";
    pub const OPEN_POLLS: &str = "open-poll/";

    pub fn club(club_id: Uuid) -> String {
        format!("{}{}/", ROOT, club_id)
    }

    pub fn polls(club_id: Uuid) -> String {
        format!("club/{}/poll/", club_id)
    }

    pub fn poll(club_id: Uuid, poll_id: Uuid) -> String {
        format!("{}{}", polls(club_id), poll_id)
    }

    pub fn open_poll(club_id: Uuid) -> String {
        format!("{}{}", OPEN_POLLS, club_id)
    }

    /// Club owning the marker stored at `key`.
    pub fn parse_open_poll(key: &str) -> Option<Uuid> {
        Uuid::parse_str(key.strip_prefix(OPEN_POLLS)?).ok()
    }

    pub fn poll_submissions(club_id: Uuid, poll_id: Uuid) -> String {
        format!("club/{}/submission/{}/", club_id, poll_id)
    }

    pub fn user_submissions(club_id: Uuid, poll_id: Uuid, user_id: Uuid) -> String {
        format!("{}{}/", poll_submissions(club_id, poll_id), user_id)
    }

    /// One of the author's numbered submission slots for a poll.
    pub fn submission_slot(club_id: Uuid, poll_id: Uuid, user_id: Uuid, slot: usize) -> String {
        format!("{}{}", user_submissions(club_id, poll_id, user_id), slot)
    }

    pub fn votes(club_id: Uuid) -> String {
        format!("club/{}/vote/", club_id)
    }

    pub fn vote(club_id: Uuid, vote_id: Uuid) -> String {
        format!("{}{}", votes(club_id), vote_id)
    }

    pub fn ballot_index(club_id: Uuid, poll_id: Uuid, user_id: Uuid) -> String {
        format!("club/{}/ballot/{}/{}", club_id, poll_id, user_id)
    }

    pub fn member(club_id: Uuid, user_id: Uuid) -> String {
        format!("club/{}/member/{}", club_id, user_id)
    }
}

/// In-process store, used for tests and single-node runs.
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
    changes: broadcast::Sender<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            records: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    fn notify(&self, key: &str) {
        // No receivers is not an error.
        let _ = self.changes.send(key.to_string());
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.records.lock().map(|r| r.len()).unwrap_or(0);
        f.debug_struct("MemoryStore").field("records", &len).finish()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockFailed)?;
        Ok(records.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Record>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockFailed)?;
        let mut found: Vec<Record> = records
            .values()
            .filter(|r| r.key.starts_with(prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64, StoreError> {
        let version = {
            let mut records = self.records.lock().map_err(|_| StoreError::LockFailed)?;
            let version = records.get(key).map_or(1, |r| r.version + 1);
            records.insert(key.to_string(), Record { key: key.to_string(), version, value });
            version
        };
        self.notify(key);
        Ok(version)
    }

    async fn compare_and_swap(&self, key: &str, expected: Option<u64>, value: Value) -> Result<u64, StoreError> {
        let version = {
            let mut records = self.records.lock().map_err(|_| StoreError::LockFailed)?;
            let current = records.get(key).map(|r| r.version);
            if current != expected {
                return Err(StoreError::VersionConflict(key.to_string()));
            }
            let version = current.map_or(1, |v| v + 1);
            records.insert(key.to_string(), Record { key: key.to_string(), version, value });
            version
        };
        self.notify(key);
        Ok(version)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

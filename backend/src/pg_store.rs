use serde_json::Value;
use sqlx::{postgres::{PgListener, PgRow}, PgPool, Row};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use crate::store::{Record, Store, StoreError};

pub const CHANGE_CHANNEL: &str = "kv_changes";
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Postgres-backed store over a single `kv_records` table. Writes are
/// announced with `pg_notify` so watchers on every instance see them.
pub struct PgStore {
    pool: PgPool,
    changes: broadcast::Sender<String>,
}

impl PgStore {
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!("📡 Listening for record changes on '{}'", CHANGE_CHANNEL);

        let sender = changes.clone();
        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let _ = sender.send(notification.payload().to_string());
                    }
                    Err(e) => {
                        error!("Change listener error: {}", e);
                        sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self { pool, changes })
    }

    fn to_record(row: &PgRow) -> Result<Record, StoreError> {
        let version: i64 = row.try_get("version")?;
        Ok(Record {
            key: row.try_get("key")?,
            version: version as u64,
            value: row.try_get("value")?,
        })
    }
}

#[rocket::async_trait]
impl Store for PgStore {
    async fn get(&self, key: &str) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query("SELECT key, version, value FROM kv_records WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::to_record).transpose()
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Record>, StoreError> {
        sqlx::query(
            "SELECT key, version, value FROM kv_records
             WHERE left(key, length($1)) = $1
             ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(Self::to_record)
        .collect()
    }

    async fn put(&self, key: &str, value: Value) -> Result<u64, StoreError> {
        let version: i64 = sqlx::query_scalar(
            "WITH written AS (
                 INSERT INTO kv_records (key, version, value) VALUES ($1, 1, $2)
                 ON CONFLICT (key) DO UPDATE
                 SET value = EXCLUDED.value, version = kv_records.version + 1, updated_at = NOW()
                 RETURNING key, version
             )
             SELECT version FROM written, LATERAL pg_notify($3, written.key)",
        )
        .bind(key)
        .bind(&value)
        .bind(CHANGE_CHANNEL)
        .fetch_one(&self.pool)
        .await?;

        Ok(version as u64)
    }

    /// The write and its `pg_notify` run as one statement, so a committed
    /// write is always announced and a failed one never is.
    async fn compare_and_swap(&self, key: &str, expected: Option<u64>, value: Value) -> Result<u64, StoreError> {
        let written: Option<i64> = match expected {
            None => {
                sqlx::query_scalar(
                    "WITH written AS (
                         INSERT INTO kv_records (key, version, value) VALUES ($1, 1, $2)
                         ON CONFLICT (key) DO NOTHING
                         RETURNING key, version
                     )
                     SELECT version FROM written, LATERAL pg_notify($3, written.key)",
                )
                .bind(key)
                .bind(&value)
                .bind(CHANGE_CHANNEL)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query_scalar(
                    "WITH written AS (
                         UPDATE kv_records
                         SET value = $2, version = version + 1, updated_at = NOW()
                         WHERE key = $1 AND version = $4
                         RETURNING key, version
                     )
                     SELECT version FROM written, LATERAL pg_notify($3, written.key)",
                )
                .bind(key)
                .bind(&value)
                .bind(CHANGE_CHANNEL)
                .bind(version as i64)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let version = written.ok_or_else(|| StoreError::VersionConflict(key.to_string()))?;
        Ok(version as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument, warn};

use super::kv::{AtomicWrite, Entry, KeyValueStore, Mutation, Version};
use super::{Key, Namespace, StoreError};

const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: [&str; 3] = [
    "CREATE SEQUENCE IF NOT EXISTS kv_versionstamp",
    "CREATE TABLE IF NOT EXISTS kv_entries (
        key TEXT PRIMARY KEY,
        namespace TEXT NOT NULL,
        value JSONB NOT NULL,
        version BIGINT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_kv_entries_namespace ON kv_entries(namespace)",
];

/// PostgreSQL implementation of the key-value backend
///
/// Commits run in SERIALIZABLE transactions; a serialization failure or a
/// lost insert race is reported as a conflict, same as a failed check.
pub struct PostgresKvStore {
    pool: PgPool,
}

impl PostgresKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the table and version sequence if they don't exist yet
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        info!("Key-value schema ready");
        Ok(())
    }
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    let code = error
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some(SERIALIZATION_FAILURE) | Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(format!("concurrent transaction won: {}", error))
        }
        _ => StoreError::Database(error.to_string()),
    }
}

fn to_version(raw: i64) -> Version {
    Version(raw as u64)
}

#[async_trait]
impl KeyValueStore for PostgresKvStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &Key) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query("SELECT value, version FROM kv_entries WHERE key = $1")
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read key from database");
                map_sqlx_error(e)
            })?;

        let entry = match row {
            Some(row) => {
                let value: Json<Value> = row.try_get("value").map_err(map_sqlx_error)?;
                let version: i64 = row.try_get("version").map_err(map_sqlx_error)?;
                Some(Entry {
                    value: value.0,
                    version: to_version(version),
                })
            }
            None => None,
        };

        debug!(found = entry.is_some(), "Read key from database");
        Ok(entry)
    }

    #[instrument(skip(self))]
    async fn list(&self, namespace: Namespace) -> Result<Vec<(Key, Entry)>, StoreError> {
        let rows = sqlx::query(
            "SELECT key, value, version FROM kv_entries WHERE namespace = $1 ORDER BY key",
        )
        .bind(namespace.prefix())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_key: String = row.try_get("key").map_err(map_sqlx_error)?;
            let Some(key) = Key::parse(&raw_key) else {
                warn!(key = %raw_key, "Skipping row with unrecognized key");
                continue;
            };
            let value: Json<Value> = row.try_get("value").map_err(map_sqlx_error)?;
            let version: i64 = row.try_get("version").map_err(map_sqlx_error)?;
            entries.push((
                key,
                Entry {
                    value: value.0,
                    version: to_version(version),
                },
            ));
        }

        debug!(count = entries.len(), "Listed namespace from database");
        Ok(entries)
    }

    #[instrument(skip(self, write), fields(checks = write.checks.len(), mutations = write.mutations.len()))]
    async fn commit(&self, write: AtomicWrite) -> Result<Version, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for (key, expected) in &write.checks {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM kv_entries WHERE key = $1 FOR UPDATE")
                    .bind(key.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;

            if actual.map(to_version) != *expected {
                warn!(key = %key, ?expected, ?actual, "Atomic check failed");
                return Err(StoreError::Conflict(format!("{} changed since it was read", key)));
            }
        }

        let raw_version: i64 = sqlx::query_scalar("SELECT nextval('kv_versionstamp')")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for mutation in &write.mutations {
            match mutation {
                Mutation::Set(key, value) => {
                    sqlx::query(
                        "INSERT INTO kv_entries (key, namespace, value, version) VALUES ($1, $2, $3, $4)
                         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, version = EXCLUDED.version",
                    )
                    .bind(key.to_string())
                    .bind(key.namespace.prefix())
                    .bind(Json(value.clone()))
                    .bind(raw_version)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                }
                Mutation::Delete(key) => {
                    sqlx::query("DELETE FROM kv_entries WHERE key = $1")
                        .bind(key.to_string())
                        .execute(&mut *tx)
                        .await
                        .map_err(map_sqlx_error)?;
                }
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        let version = to_version(raw_version);
        debug!(%version, "Atomic write committed in database");
        Ok(version)
    }
}

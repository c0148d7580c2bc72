//! SQLite session store adapter.

use crate::adapters::stored_record::{decode_record, encode_timestamp};
use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::StoreKey;
use crate::ports::config_port::ConfigPort;
use crate::ports::session_store_port::SessionStore;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratlabError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| StratlabError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| StratlabError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, StratlabError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| StratlabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), StratlabError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS step_records (
                storage_key TEXT NOT NULL,
                session_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (storage_key, session_id)
            );
            CREATE INDEX IF NOT EXISTS idx_step_records_session ON step_records(session_id);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Stores `payload_json` verbatim, stamped with the current time.
    pub fn put_raw(&self, key: &StoreKey, payload_json: &str) -> Result<(), StratlabError> {
        self.upsert(key, payload_json, Utc::now())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StratlabError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| StratlabError::Database {
                reason: e.to_string(),
            })
    }

    fn upsert(
        &self,
        key: &StoreKey,
        payload_json: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StratlabError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO step_records (storage_key, session_id, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.namespace,
                key.session_id.as_str(),
                payload_json,
                encode_timestamp(recorded_at)
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }
}

impl SessionStore for SqliteAdapter {
    fn put(&self, key: &StoreKey, payload: &StepPayload) -> Result<StepRecord, StratlabError> {
        let record = StepRecord::stamped_now(payload.clone());
        let payload_json =
            serde_json::to_string(&record.payload).map_err(|e| StratlabError::Serialization {
                reason: e.to_string(),
            })?;

        self.upsert(key, &payload_json, record.timestamp)?;
        tracing::debug!(key = %key, "stored step record");
        Ok(record)
    }

    fn get(&self, key: &StoreKey) -> Result<StepRecord, StratlabError> {
        let conn = self.conn()?;

        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, recorded_at FROM step_records
                 WHERE storage_key = ?1 AND session_id = ?2",
                params![key.namespace, key.session_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(query_error)?;

        let (payload_json, recorded_at) = row.ok_or_else(|| StratlabError::NotFound {
            key: key.to_string(),
        })?;

        decode_record(key, &payload_json, &recorded_at)
    }

    fn has(&self, key: &StoreKey) -> bool {
        let exists = self.conn().and_then(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM step_records WHERE storage_key = ?1 AND session_id = ?2)",
                params![key.namespace, key.session_id.as_str()],
                |row| row.get::<_, bool>(0),
            )
            .map_err(query_error)
        });

        match exists {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "existence check failed");
                false
            }
        }
    }
}

fn query_error(e: rusqlite::Error) -> StratlabError {
    StratlabError::DatabaseQuery {
        reason: e.to_string(),
    }
}

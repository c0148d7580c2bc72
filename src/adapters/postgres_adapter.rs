//! PostgreSQL session store adapter.

use crate::adapters::stored_record::{decode_record, encode_timestamp};
use crate::domain::error::StratlabError;
use crate::domain::record::{StepPayload, StepRecord};
use crate::domain::session::StoreKey;
use crate::ports::config_port::ConfigPort;
use crate::ports::session_store_port::SessionStore;
use chrono::{DateTime, Utc};
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratlabError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| StratlabError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let pg_config: postgres::Config =
            connection_string
                .parse()
                .map_err(|e: postgres::Error| StratlabError::ConfigInvalid {
                    section: "postgres".into(),
                    key: "connection_string".into(),
                    reason: e.to_string(),
                })?;

        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(pg_config, NoTls))
            .map_err(|e: r2d2::Error| StratlabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), StratlabError> {
        let mut conn = self.conn()?;
        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS step_records (
                storage_key TEXT NOT NULL,
                session_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (storage_key, session_id)
            );
            CREATE INDEX IF NOT EXISTS idx_step_records_session ON step_records(session_id);",
        )
        .map_err(query_error)
    }

    /// Stores `payload_json` verbatim, stamped with the current time.
    pub fn put_raw(&self, key: &StoreKey, payload_json: &str) -> Result<(), StratlabError> {
        self.upsert(key, payload_json, Utc::now())
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, StratlabError> {
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
        let mut conn = self.conn()?;
        conn.execute(
            "INSERT INTO step_records (storage_key, session_id, payload, recorded_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (storage_key, session_id)
             DO UPDATE SET payload = EXCLUDED.payload, recorded_at = EXCLUDED.recorded_at",
            &[
                &key.namespace,
                &key.session_id.as_str(),
                &payload_json,
                &encode_timestamp(recorded_at),
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }
}

impl SessionStore for PostgresAdapter {
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
        let mut conn = self.conn()?;
        let row = conn
            .query_opt(
                "SELECT payload, recorded_at FROM step_records
                 WHERE storage_key = $1 AND session_id = $2",
                &[&key.namespace, &key.session_id.as_str()],
            )
            .map_err(query_error)?
            .ok_or_else(|| StratlabError::NotFound {
                key: key.to_string(),
            })?;

        let payload_json: String = row.get(0);
        let recorded_at: String = row.get(1);
        decode_record(key, &payload_json, &recorded_at)
    }

    fn has(&self, key: &StoreKey) -> bool {
        let exists = self.conn().and_then(|mut conn| {
            conn.query_one(
                "SELECT EXISTS(SELECT 1 FROM step_records WHERE storage_key = $1 AND session_id = $2)",
                &[&key.namespace, &key.session_id.as_str()],
            )
            .map(|row| row.get::<_, bool>(0))
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

fn query_error(e: postgres::Error) -> StratlabError {
    StratlabError::DatabaseQuery {
        reason: e.to_string(),
    }
}

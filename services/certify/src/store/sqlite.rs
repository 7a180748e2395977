//! SQLite-backed durable store.
//!
//! rusqlite is blocking, so every call hops onto the blocking pool and takes
//! the connection mutex there.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use certify_id::CertificateId;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use super::{CertificateRecord, CertificateStore, StoreError};
use crate::name::CertificateName;

/// SQLite certificate store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS certificates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                qr TEXT NOT NULL,
                issued_at TEXT NOT NULL
            );
            "#,
        )?;
        debug!("Certificate store schema initialized");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_record(
    (id, name, qr, issued_at): (String, String, String, String),
) -> Result<CertificateRecord, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        id: id.clone(),
        reason,
    };

    let parsed_id = CertificateId::parse(&id).map_err(|e| corrupt(e.to_string()))?;
    let name = CertificateName::parse(&name).map_err(|e| corrupt(e.to_string()))?;
    let issued_at = DateTime::parse_from_rfc3339(&issued_at)
        .map_err(|e| corrupt(e.to_string()))?
        .with_timezone(&Utc);

    Ok(CertificateRecord {
        id: parsed_id,
        name,
        qr,
        issued_at,
    })
}

#[async_trait]
impl CertificateStore for SqliteStore {
    async fn put(&self, record: CertificateRecord) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO certificates (id, name, qr, issued_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    record.name.as_str(),
                    record.qr,
                    record.issued_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::Duplicate(record.id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get(&self, id: &CertificateId) -> Result<Option<CertificateRecord>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, qr, issued_at FROM certificates WHERE id = ?1",
                params![id],
                record_from_row,
            )
            .optional()?
            .map(decode_record)
            .transpose()
        })
        .await
    }

    async fn remove(&self, id: &CertificateId) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute("DELETE FROM certificates WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn ids(&self) -> Result<Vec<CertificateId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM certificates ORDER BY id")?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            raw.into_iter()
                .map(|id| {
                    CertificateId::parse(&id).map_err(|e| StoreError::Corrupt {
                        id,
                        reason: e.to_string(),
                    })
                })
                .collect()
        })
        .await
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}

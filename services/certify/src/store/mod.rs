//! Certificate record storage.
//!
//! The service talks to storage only through [`CertificateStore`], so the
//! backend is chosen at startup:
//! - [`MemoryStore`]: volatile, records die with the process
//! - [`SqliteStore`]: durable, records survive restarts
//!
//! Stores are insert-only from the issuing path. A second `put` for an id that
//! already exists is rejected with [`StoreError::Duplicate`] and the original
//! record is left untouched.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use certify_id::CertificateId;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::name::CertificateName;

/// One issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    pub id: CertificateId,
    pub name: CertificateName,
    /// `data:image/png;base64,...` QR image of the verification URL.
    pub qr: String,
    pub issued_at: DateTime<Utc>,
}

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("certificate already exists: {0}")]
    Duplicate(CertificateId),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Keyed storage of issued certificates.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Inserts a new record. Fails with [`StoreError::Duplicate`] if the id exists.
    async fn put(&self, record: CertificateRecord) -> Result<(), StoreError>;

    async fn get(&self, id: &CertificateId) -> Result<Option<CertificateRecord>, StoreError>;

    /// Deletes a record, returning whether it existed.
    ///
    /// Only used to undo a commit that failed half way or to drop records
    /// whose file never landed.
    async fn remove(&self, id: &CertificateId) -> Result<bool, StoreError>;

    /// All stored ids, oldest first.
    async fn ids(&self) -> Result<Vec<CertificateId>, StoreError>;

    /// Whether records outlive the process.
    fn is_durable(&self) -> bool;

    async fn health_check(&self) -> Result<(), StoreError>;
}

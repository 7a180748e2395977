//! Volatile in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use certify_id::CertificateId;
use tokio::sync::RwLock;

use super::{CertificateRecord, CertificateStore, StoreError};

/// Records held in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<CertificateId, CertificateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn put(&self, record: CertificateRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: &CertificateId) -> Result<Option<CertificateRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &CertificateId) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn ids(&self) -> Result<Vec<CertificateId>, StoreError> {
        let mut ids: Vec<_> = self.records.read().await.keys().copied().collect();
        // ULIDs sort by creation time.
        ids.sort();
        Ok(ids)
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

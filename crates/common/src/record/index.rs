use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::linked_data::{cid_string, Cid};

/// Where a record lives: the key it is anchored under and the CID it
///  resolved to when it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIndexEntry {
    pub record_id: Uuid,
    pub anchor_key: String,
    #[serde(with = "cid_string")]
    pub cid: Cid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("record index error: {0}")]
    Backend(String),
    #[error("corrupt index entry for {record_id}: {reason}")]
    Corrupt { record_id: String, reason: String },
}

/// The record service's own mapping from record id to anchor key
#[async_trait]
pub trait RecordIndex: Send + Sync + std::fmt::Debug {
    /// Insert or replace the entry for `entry.record_id`
    async fn upsert(&self, entry: &RecordIndexEntry) -> Result<(), IndexError>;

    async fn get(&self, record_id: Uuid) -> Result<Option<RecordIndexEntry>, IndexError>;

    /// All entries, oldest first
    async fn list(&self) -> Result<Vec<RecordIndexEntry>, IndexError>;
}

#[async_trait]
impl<T> RecordIndex for Arc<T>
where
    T: RecordIndex + ?Sized,
{
    async fn upsert(&self, entry: &RecordIndexEntry) -> Result<(), IndexError> {
        (**self).upsert(entry).await
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<RecordIndexEntry>, IndexError> {
        (**self).get(record_id).await
    }

    async fn list(&self) -> Result<Vec<RecordIndexEntry>, IndexError> {
        (**self).list().await
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordIndex {
    inner: Arc<RwLock<HashMap<Uuid, RecordIndexEntry>>>,
}

impl MemoryRecordIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordIndex for MemoryRecordIndex {
    async fn upsert(&self, entry: &RecordIndexEntry) -> Result<(), IndexError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|e| IndexError::Backend(format!("failed to acquire write lock: {}", e)))?;
        inner.insert(entry.record_id, entry.clone());
        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<RecordIndexEntry>, IndexError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| IndexError::Backend(format!("failed to acquire read lock: {}", e)))?;
        Ok(inner.get(&record_id).cloned())
    }

    async fn list(&self) -> Result<Vec<RecordIndexEntry>, IndexError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| IndexError::Backend(format!("failed to acquire read lock: {}", e)))?;
        let mut entries: Vec<_> = inner.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        Ok(entries)
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ContentError, ContentStore};
use crate::linked_data::{content_cid, Cid};

/// In-memory content store keyed by locally derived CIDs
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<RwLock<HashMap<Cid, PinnedBlob>>>,
}

#[derive(Debug, Clone)]
struct PinnedBlob {
    /// Name of the most recent upload of these bytes
    name: String,
    data: Bytes,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a blob is pinned under `cid`, referenced or not
    pub fn contains(&self, cid: &Cid) -> bool {
        self.inner
            .read()
            .map(|inner| inner.contains_key(cid))
            .unwrap_or(false)
    }

    /// Name the blob under `cid` was last uploaded with
    pub fn name_of(&self, cid: &Cid) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.get(cid).map(|blob| blob.name.clone()))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, blob: Bytes, name: &str) -> Result<Cid, ContentError> {
        let cid = content_cid(&blob);
        let mut inner = self.inner.write().map_err(|e| {
            ContentError::Store(format!("failed to acquire write lock: {}", e))
        })?;
        inner.insert(
            cid,
            PinnedBlob {
                name: name.to_string(),
                data: blob,
            },
        );
        tracing::debug!("pinned {} as {}", name, cid);
        Ok(cid)
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, ContentError> {
        let inner = self
            .inner
            .read()
            .map_err(|e| ContentError::Store(format!("failed to acquire read lock: {}", e)))?;
        inner
            .get(cid)
            .map(|blob| blob.data.clone())
            .ok_or(ContentError::NotFound(*cid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let store = MemoryContentStore::new();
        let data = Bytes::from_static(b"ciphertext bytes");

        let cid = store.put(data.clone(), "a.enc").await.unwrap();
        assert_eq!(store.get(&cid).await.unwrap(), data);
        assert!(store.contains(&cid));
        assert_eq!(store.name_of(&cid).as_deref(), Some("a.enc"));
    }

    #[tokio::test]
    async fn test_identical_bytes_share_a_cid() {
        let store = MemoryContentStore::new();
        let data = Bytes::from_static(b"same bytes");

        let first = store.put(data.clone(), "first.enc").await.unwrap();
        let second = store.put(data, "second.enc").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.name_of(&first).as_deref(), Some("second.enc"));
    }

    #[tokio::test]
    async fn test_unknown_cid() {
        let store = MemoryContentStore::new();
        let cid = content_cid(b"never uploaded");

        assert!(matches!(
            store.get(&cid).await,
            Err(ContentError::NotFound(missing)) if missing == cid
        ));
        assert!(store.is_empty());
    }
}

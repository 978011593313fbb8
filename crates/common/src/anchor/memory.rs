use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{AnchorError, AnchorEvent, AnchorRegistry, HistoryRange};
use crate::linked_data::Cid;

/// In-memory anchor registry, last write wins per key
///
/// Keeps every anchoring per key, oldest first, so history can be served.
#[derive(Debug, Clone, Default)]
pub struct MemoryAnchorRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<AnchorEvent>>>>,
}

impl MemoryAnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnchorRegistry for MemoryAnchorRegistry {
    async fn store(&self, key: &str, cid: &Cid) -> Result<(), AnchorError> {
        let mut inner = self.inner.write().map_err(|e| {
            AnchorError::Registry(format!("failed to acquire write lock: {}", e))
        })?;
        let events = inner.entry(key.to_string()).or_default();
        if let Some(previous) = events.last() {
            tracing::debug!("re-anchored {:?}: {} -> {}", key, previous.cid, cid);
        }
        events.push(AnchorEvent {
            key: key.to_string(),
            cid: *cid,
            anchored_at: Utc::now(),
            block: None,
            block_hash: None,
        });
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Cid, AnchorError> {
        let inner = self.inner.read().map_err(|e| {
            AnchorError::Registry(format!("failed to acquire read lock: {}", e))
        })?;
        inner
            .get(key)
            .and_then(|events| events.last())
            .map(|event| event.cid)
            .ok_or_else(|| AnchorError::NotFound(key.to_string()))
    }

    async fn history(&self, key: &str, range: &HistoryRange) -> Result<Vec<AnchorEvent>, AnchorError> {
        let inner = self.inner.read().map_err(|e| {
            AnchorError::Registry(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(inner
            .get(key)
            .map(|events| {
                events
                    .iter()
                    .rev()
                    .filter(|event| range.contains(&event.anchored_at))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_data::content_cid;

    #[tokio::test]
    async fn test_last_write_wins() {
        let registry = MemoryAnchorRegistry::new();
        let first = content_cid(b"first");
        let second = content_cid(b"second");

        registry.store("tourist@example.com", &first).await.unwrap();
        registry.store("tourist@example.com", &second).await.unwrap();

        assert_eq!(registry.lookup("tourist@example.com").await.unwrap(), second);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let registry = MemoryAnchorRegistry::new();
        let result = registry.lookup("nobody@example.com").await;
        assert!(matches!(result, Err(AnchorError::NotFound(key)) if key == "nobody@example.com"));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let registry = MemoryAnchorRegistry::new();
        let first = content_cid(b"first");
        let second = content_cid(b"second");
        registry.store("k", &first).await.unwrap();
        registry.store("k", &second).await.unwrap();
        registry.store("other", &first).await.unwrap();

        let history = registry.history("k", &HistoryRange::all()).await.unwrap();
        let cids: Vec<Cid> = history.iter().map(|event| event.cid).collect();
        assert_eq!(cids, vec![second, first]);
        assert!(history[0].anchored_at >= history[1].anchored_at);

        let future = HistoryRange {
            start: Some(Utc::now() + chrono::Duration::hours(1)),
            end: None,
        };
        assert!(registry.history("k", &future).await.unwrap().is_empty());
        assert!(registry.history("nobody", &HistoryRange::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let registry = MemoryAnchorRegistry::new();
        let a = content_cid(b"a");
        let b = content_cid(b"b");

        registry.store("a", &a).await.unwrap();
        registry.store("b", &b).await.unwrap();

        assert_eq!(registry.lookup("a").await.unwrap(), a);
        assert_eq!(registry.lookup("b").await.unwrap(), b);
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::block::{AnchorPayload, Block};
use super::ledger::{ChainError, HashChain};
use super::store::BlockStore;
use crate::anchor::{AnchorError, AnchorEvent, AnchorRegistry, HistoryRange};
use crate::linked_data::{parse_cid, Cid};

impl From<ChainError> for AnchorError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Integrity(e) => AnchorError::ChainIntegrity(e),
            ChainError::Mining(e) => AnchorError::Mining(e),
            ChainError::Store(e) => AnchorError::Registry(e.to_string()),
        }
    }
}

/// Anchor registry backed by the local proof-of-work chain
///
/// Every `store` mines a new block; `lookup` returns the CID of the newest
///  block for the key. Blocks returned by the store are re-checked against
///  the requested key and their own seal before they are trusted.
#[derive(Debug)]
pub struct ChainAnchorRegistry<S> {
    chain: Arc<HashChain<S>>,
}

impl<S> Clone for ChainAnchorRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
        }
    }
}

impl<S: BlockStore> ChainAnchorRegistry<S> {
    pub fn new(chain: Arc<HashChain<S>>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<HashChain<S>> {
        &self.chain
    }
}

#[async_trait]
impl<S: BlockStore> AnchorRegistry for ChainAnchorRegistry<S> {
    async fn store(&self, key: &str, cid: &Cid) -> Result<(), AnchorError> {
        let block = self
            .chain
            .append(AnchorPayload::new(key, cid.to_string()))
            .await?;
        tracing::info!(key, %cid, block = block.id, "anchored cid on chain");
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Result<Cid, AnchorError> {
        let block = self
            .chain
            .find_latest(key)
            .await?
            .ok_or_else(|| AnchorError::NotFound(key.to_string()))?;
        block_cid(&block)
    }

    async fn history(&self, key: &str, range: &HistoryRange) -> Result<Vec<AnchorEvent>, AnchorError> {
        let mut events = Vec::new();
        for block in self.chain.find_all(key).await? {
            let anchored_at = DateTime::<Utc>::from_timestamp_millis(block.timestamp).ok_or_else(|| {
                AnchorError::Registry(format!("block {} has an out of range timestamp", block.id))
            })?;
            if !range.contains(&anchored_at) {
                continue;
            }
            events.push(AnchorEvent {
                key: key.to_string(),
                cid: block_cid(&block)?,
                anchored_at,
                block: Some(block.id),
                block_hash: Some(block.hash),
            });
        }
        Ok(events)
    }
}

fn block_cid(block: &Block) -> Result<Cid, AnchorError> {
    parse_cid(&block.payload.cid)
        .map_err(|e| AnchorError::InvalidCid(format!("{}: {}", block.payload.cid, e)))
}

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::block::Block;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockStoreError {
    /// The block's id does not extend the stored chain
    #[error("block {id} does not follow the current tip (expected id {expected})")]
    Conflict { id: u64, expected: u64 },
    #[error("block store error: {0}")]
    Backend(String),
}

/// Append-only storage for sealed blocks
#[async_trait]
pub trait BlockStore: Send + Sync + std::fmt::Debug {
    /// Persist `block` as the new tip. Must reject ids that do not equal
    ///  the current length.
    async fn append(&self, block: &Block) -> Result<(), BlockStoreError>;

    /// Every block, ordered by id
    async fn blocks(&self) -> Result<Vec<Block>, BlockStoreError>;

    async fn tip(&self) -> Result<Option<Block>, BlockStoreError>;

    async fn len(&self) -> Result<u64, BlockStoreError>;

    /// Most recent non-genesis block anchoring `key`
    async fn latest_for_key(&self, key: &str) -> Result<Option<Block>, BlockStoreError> {
        Ok(self
            .blocks()
            .await?
            .into_iter()
            .rev()
            .find(|block| !block.is_genesis() && block.payload.key == key))
    }

    /// Every non-genesis block anchoring `key`, newest first
    async fn history_for_key(&self, key: &str) -> Result<Vec<Block>, BlockStoreError> {
        let mut blocks: Vec<Block> = self
            .blocks()
            .await?
            .into_iter()
            .filter(|block| !block.is_genesis() && block.payload.key == key)
            .collect();
        blocks.reverse();
        Ok(blocks)
    }
}

#[async_trait]
impl<T> BlockStore for Arc<T>
where
    T: BlockStore + ?Sized,
{
    async fn append(&self, block: &Block) -> Result<(), BlockStoreError> {
        (**self).append(block).await
    }

    async fn blocks(&self) -> Result<Vec<Block>, BlockStoreError> {
        (**self).blocks().await
    }

    async fn tip(&self) -> Result<Option<Block>, BlockStoreError> {
        (**self).tip().await
    }

    async fn len(&self) -> Result<u64, BlockStoreError> {
        (**self).len().await
    }

    async fn latest_for_key(&self, key: &str) -> Result<Option<Block>, BlockStoreError> {
        (**self).latest_for_key(key).await
    }

    async fn history_for_key(&self, key: &str) -> Result<Vec<Block>, BlockStoreError> {
        (**self).history_for_key(key).await
    }
}

/// Block store holding the chain in a vector
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<RwLock<Vec<Block>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing sequence of blocks, without validating it
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks: Arc::new(RwLock::new(blocks)),
        }
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn append(&self, block: &Block) -> Result<(), BlockStoreError> {
        let mut blocks = self.blocks.write().map_err(|e| {
            BlockStoreError::Backend(format!("failed to acquire write lock: {}", e))
        })?;
        let expected = blocks.len() as u64;
        if block.id != expected {
            return Err(BlockStoreError::Conflict {
                id: block.id,
                expected,
            });
        }
        blocks.push(block.clone());
        Ok(())
    }

    async fn blocks(&self) -> Result<Vec<Block>, BlockStoreError> {
        let blocks = self.blocks.read().map_err(|e| {
            BlockStoreError::Backend(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(blocks.clone())
    }

    async fn tip(&self) -> Result<Option<Block>, BlockStoreError> {
        let blocks = self.blocks.read().map_err(|e| {
            BlockStoreError::Backend(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(blocks.last().cloned())
    }

    async fn len(&self) -> Result<u64, BlockStoreError> {
        let blocks = self.blocks.read().map_err(|e| {
            BlockStoreError::Backend(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(blocks.len() as u64)
    }
}

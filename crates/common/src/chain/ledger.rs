use serde::Serialize;
use tokio::sync::Mutex;

use super::block::{meets_difficulty, AnchorPayload, Block, Candidate, GENESIS_PREVIOUS_HASH};
use super::merkle::compute_merkle_root;
use super::miner::{Miner, MiningConfig, MiningError};
use super::store::{BlockStore, BlockStoreError};

/// The first broken invariant found while walking the chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainIntegrityError {
    #[error("block {block}: stored hash does not match its contents")]
    HashMismatch { block: u64 },
    #[error("block {block}: previous hash does not match the preceding block")]
    BrokenLink { block: u64 },
    #[error("block {block}: hash does not meet the difficulty target")]
    InsufficientWork { block: u64 },
    #[error("block {block}: merkle root does not match the payload")]
    MerkleMismatch { block: u64 },
    #[error("block {block} found where block {expected} was expected")]
    OutOfSequence { block: u64, expected: u64 },
    #[error("chain has no genesis block")]
    MissingGenesis,
    /// The store returned a block anchoring a different key than was asked for
    #[error("block {block} does not anchor the requested key")]
    KeyMismatch { block: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    Integrity(#[from] ChainIntegrityError),
    #[error(transparent)]
    Mining(#[from] MiningError),
    #[error(transparent)]
    Store(#[from] BlockStoreError),
}

/// Summary of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Number of blocks, genesis included
    pub blocks: u64,
    /// Hash of the last block
    pub tip: String,
}

/// Check every block of `blocks` (ordered by id) against the chain invariants
pub fn verify_blocks(blocks: &[Block], difficulty: usize) -> Result<ChainReport, ChainIntegrityError> {
    let mut previous: Option<&Block> = None;
    for (position, block) in blocks.iter().enumerate() {
        let expected = position as u64;
        if block.id != expected {
            return Err(ChainIntegrityError::OutOfSequence {
                block: block.id,
                expected,
            });
        }

        let expected_previous = previous.map_or(GENESIS_PREVIOUS_HASH, |p| p.hash.as_str());
        if block.previous_hash != expected_previous {
            return Err(ChainIntegrityError::BrokenLink { block: block.id });
        }
        if block.merkle_root != compute_merkle_root(&block.payload.leaves()) {
            return Err(ChainIntegrityError::MerkleMismatch { block: block.id });
        }
        if block.compute_hash() != block.hash {
            return Err(ChainIntegrityError::HashMismatch { block: block.id });
        }
        if !meets_difficulty(&block.hash, difficulty) {
            return Err(ChainIntegrityError::InsufficientWork { block: block.id });
        }
        previous = Some(block);
    }

    let tip = previous.ok_or(ChainIntegrityError::MissingGenesis)?;
    Ok(ChainReport {
        blocks: blocks.len() as u64,
        tip: tip.hash.clone(),
    })
}

/// Check a single block looked up for `key` without walking the chain
///
/// Stores may index blocks by key outside the hashed contents, so a block
///  handed back for `key` is only trusted once it is shown to anchor `key`
///  and its seal still holds.
pub fn verify_anchor_block(block: &Block, key: &str, difficulty: usize) -> Result<(), ChainIntegrityError> {
    if block.is_genesis() || block.payload.key != key {
        return Err(ChainIntegrityError::KeyMismatch { block: block.id });
    }
    if block.merkle_root != compute_merkle_root(&block.payload.leaves()) {
        return Err(ChainIntegrityError::MerkleMismatch { block: block.id });
    }
    if block.compute_hash() != block.hash {
        return Err(ChainIntegrityError::HashMismatch { block: block.id });
    }
    if !meets_difficulty(&block.hash, difficulty) {
        return Err(ChainIntegrityError::InsufficientWork { block: block.id });
    }
    Ok(())
}

/// Append-only proof-of-work chain over a [`BlockStore`]
///
/// A single writer at a time builds, mines and commits the next block; the
///  lock is held across mining so two appends can never race for the same id.
///  A block that fails to mine is discarded without touching the store.
#[derive(Debug)]
pub struct HashChain<S> {
    store: S,
    miner: Miner,
    writer: Mutex<()>,
}

impl<S: BlockStore> HashChain<S> {
    /// Open a chain over `store`, mining the genesis block if the store is empty
    pub async fn open(store: S, config: MiningConfig) -> Result<Self, ChainError> {
        let miner = Miner::new(config);
        if store.len().await? == 0 {
            let genesis = miner.mine_with_timeout(Candidate::genesis(now_millis())).await?;
            store.append(&genesis).await?;
            tracing::info!(hash = %genesis.hash, "mined genesis block");
        }

        Ok(Self {
            store,
            miner,
            writer: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mining_config(&self) -> &MiningConfig {
        self.miner.config()
    }

    /// Mine and commit a block anchoring `payload`
    pub async fn append(&self, payload: AnchorPayload) -> Result<Block, ChainError> {
        let _writer = self.writer.lock().await;

        let tip = self
            .store
            .tip()
            .await?
            .ok_or(ChainIntegrityError::MissingGenesis)?;
        let candidate = Candidate::next(&tip, payload, now_millis());
        let block = self.miner.mine_with_timeout(candidate).await?;
        self.store.append(&block).await?;

        tracing::debug!(id = block.id, nonce = block.nonce, hash = %block.hash, "appended block");
        Ok(block)
    }

    /// Walk the whole chain checking hashes, merkle roots, work and linkage
    pub async fn verify(&self) -> Result<ChainReport, ChainError> {
        let blocks = self.store.blocks().await?;
        Ok(verify_blocks(&blocks, self.miner.config().difficulty)?)
    }

    /// Most recent block anchoring `key`
    pub async fn find_latest(&self, key: &str) -> Result<Option<Block>, ChainError> {
        let Some(block) = self.store.latest_for_key(key).await? else {
            return Ok(None);
        };
        verify_anchor_block(&block, key, self.miner.config().difficulty)?;
        Ok(Some(block))
    }

    /// Every block anchoring `key`, newest first
    pub async fn find_all(&self, key: &str) -> Result<Vec<Block>, ChainError> {
        let blocks = self.store.history_for_key(key).await?;
        let difficulty = self.miner.config().difficulty;
        for block in &blocks {
            verify_anchor_block(block, key, difficulty)?;
        }
        Ok(blocks)
    }

    pub async fn len(&self) -> Result<u64, ChainError> {
        Ok(self.store.len().await?)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

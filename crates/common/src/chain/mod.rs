//! Local proof-of-work hash chain
//!
//! Blocks anchor a CID under an application key. Each block commits to its
//!  predecessor's hash and a merkle root over its payload, and carries a nonce
//!  that gives its hash a configured number of leading zero hex digits.
//!
//! Mining is CPU bound and always runs on tokio's blocking pool, bounded by a
//!  timeout and an optional attempt budget.

mod block;
mod ledger;
mod merkle;
mod miner;
mod registry;
mod store;

pub use block::{meets_difficulty, AnchorPayload, Block, Candidate, GENESIS_PREVIOUS_HASH};
pub use ledger::{verify_anchor_block, verify_blocks, ChainError, ChainIntegrityError, ChainReport, HashChain};
pub use merkle::{compute_merkle_root, sha256_hex};
pub use miner::{mine, Miner, MiningConfig, MiningError, MiningHandle, MAX_DIFFICULTY};
pub use registry::ChainAnchorRegistry;
pub use store::{BlockStore, BlockStoreError, MemoryBlockStore};

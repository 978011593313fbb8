use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::merkle::compute_merkle_root;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// What a block anchors: a CID under an application key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPayload {
    pub key: String,
    pub cid: String,
}

impl AnchorPayload {
    pub fn new(key: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cid: cid.into(),
        }
    }

    /// The genesis payload anchors nothing
    pub fn genesis() -> Self {
        Self::new("", "")
    }

    /// Leaves the block's merkle root is computed over
    pub fn leaves(&self) -> [&str; 2] {
        [self.key.as_str(), self.cid.as_str()]
    }

    pub fn to_json(&self) -> String {
        // a struct of two strings always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A sealed block of the anchor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: u64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub payload: AnchorPayload,
    pub previous_hash: String,
    pub merkle_root: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.id == 0
    }

    /// Hash the block's contents with its recorded nonce
    pub fn compute_hash(&self) -> String {
        HashPrefix::new(
            self.id,
            self.timestamp,
            &self.payload,
            &self.previous_hash,
            &self.merkle_root,
        )
        .hash(self.nonce)
    }

    /// Strip the seal, e.g. to re-mine a block
    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            id: self.id,
            timestamp: self.timestamp,
            payload: self.payload.clone(),
            previous_hash: self.previous_hash.clone(),
            merkle_root: self.merkle_root.clone(),
        }
    }
}

/// An unsealed block waiting for a nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: u64,
    pub timestamp: i64,
    pub payload: AnchorPayload,
    pub previous_hash: String,
    pub merkle_root: String,
}

impl Candidate {
    /// Build the candidate that would follow `previous`
    pub fn next(previous: &Block, payload: AnchorPayload, timestamp: i64) -> Self {
        Self::new(previous.id + 1, timestamp, payload, previous.hash.clone())
    }

    pub fn genesis(timestamp: i64) -> Self {
        Self::new(
            0,
            timestamp,
            AnchorPayload::genesis(),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    fn new(id: u64, timestamp: i64, payload: AnchorPayload, previous_hash: String) -> Self {
        let merkle_root = compute_merkle_root(&payload.leaves());
        Self {
            id,
            timestamp,
            payload,
            previous_hash,
            merkle_root,
        }
    }

    pub(crate) fn hash_prefix(&self) -> HashPrefix {
        HashPrefix::new(
            self.id,
            self.timestamp,
            &self.payload,
            &self.previous_hash,
            &self.merkle_root,
        )
    }

    pub fn seal(self, nonce: u64, hash: String) -> Block {
        Block {
            id: self.id,
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            nonce,
            hash,
        }
    }
}

/// Hasher state over everything but the nonce, so mining only
///  hashes the nonce per attempt
#[derive(Clone)]
pub(crate) struct HashPrefix(Sha256);

impl HashPrefix {
    fn new(
        id: u64,
        timestamp: i64,
        payload: &AnchorPayload,
        previous_hash: &str,
        merkle_root: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(id.to_string().as_bytes());
        hasher.update(timestamp.to_string().as_bytes());
        hasher.update(payload.to_json().as_bytes());
        hasher.update(previous_hash.as_bytes());
        hasher.update(merkle_root.as_bytes());
        Self(hasher)
    }

    pub(crate) fn hash(&self, nonce: u64) -> String {
        let mut hasher = self.0.clone();
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Whether `hash` starts with `difficulty` hex zeros
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

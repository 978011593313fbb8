//! Anchor registries
//!
//! An anchor registry maps an application key (e.g. a tourist's email) to the
//!  CID of the latest encrypted record stored under it. Writes are
//!  acknowledged only once the backing registry has durably accepted them.
//!
//! Three realisations ship with the crate:
//! * [`MemoryAnchorRegistry`] for tests and demo deployments
//! * [`RemoteAnchorRegistry`] for an HTTP-fronted ledger contract
//! * [`crate::chain::ChainAnchorRegistry`] for the local proof-of-work chain
//!
//! Registries that keep every anchoring, not just the latest, also serve a
//!  per-key history; the remote ledger contract does not.

use std::sync::Arc;

use async_trait::async_trait;

use crate::chain::{ChainIntegrityError, MiningError};
use crate::linked_data::Cid;

mod history;
mod memory;
mod remote;

pub use history::{
    anchor_history, verify_anchor, AnchorEvent, AnchorHistory, AnchorVerification, HistoryRange,
    HistoryStats,
};
pub use memory::MemoryAnchorRegistry;
pub use remote::{RemoteAnchorRegistry, RemoteLedgerConfig};

#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// Nothing has ever been anchored under this key
    #[error("no cid anchored under key {0:?}")]
    NotFound(String),
    /// The backing registry failed or refused the call
    #[error("registry error: {0}")]
    Registry(String),
    #[error("chain integrity violated: {0}")]
    ChainIntegrity(#[from] ChainIntegrityError),
    #[error("mining failed: {0}")]
    Mining(#[from] MiningError),
    /// The registry returned something that is not a CID
    #[error("invalid cid: {0}")]
    InvalidCid(String),
    #[error("registry does not support {0}")]
    Unsupported(&'static str),
}

#[async_trait]
pub trait AnchorRegistry: Send + Sync + std::fmt::Debug {
    /// Anchor `cid` under `key`, replacing whatever was there before.
    ///  Returns once the registry has acknowledged the write.
    async fn store(&self, key: &str, cid: &Cid) -> Result<(), AnchorError>;

    /// Most recent CID anchored under `key`
    async fn lookup(&self, key: &str) -> Result<Cid, AnchorError>;

    /// Every anchoring of `key` inside `range`, newest first
    async fn history(&self, key: &str, range: &HistoryRange) -> Result<Vec<AnchorEvent>, AnchorError> {
        let _ = (key, range);
        Err(AnchorError::Unsupported("anchor history"))
    }
}

#[async_trait]
impl<T> AnchorRegistry for Arc<T>
where
    T: AnchorRegistry + ?Sized,
{
    async fn store(&self, key: &str, cid: &Cid) -> Result<(), AnchorError> {
        (**self).store(key, cid).await
    }

    async fn lookup(&self, key: &str) -> Result<Cid, AnchorError> {
        (**self).lookup(key).await
    }

    async fn history(&self, key: &str, range: &HistoryRange) -> Result<Vec<AnchorEvent>, AnchorError> {
        (**self).history(key, range).await
    }
}

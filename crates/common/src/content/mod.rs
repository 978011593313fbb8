//! Content store clients
//!
//! Encrypted blobs are pinned to a content-addressable store and retrieved by
//! CID. [`PinningClient`] talks to a Pinata-compatible pinning API and an IPFS
//! gateway; [`MemoryContentStore`] keeps blobs in process for tests and demo
//! deployments.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::linked_data::Cid;
use crate::transport::Transient;

mod memory;
mod pinning;

pub use memory::MemoryContentStore;
pub use pinning::{PinningClient, PinningConfig, DEFAULT_PINNING_API_URL, DEFAULT_GATEWAY_URL};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The pinning service refused or failed the upload
    ///  (auth, quota, malformed response). Never retried.
    #[error("upload failed: {0}")]
    Upload(String),
    /// No blob is pinned under this CID
    #[error("content not found: {0}")]
    NotFound(Cid),
    /// Transient transport failure (connect, timeout, 5xx, 429)
    #[error("network error: {0}")]
    Network(String),
    /// The gateway refused the request for a reason other than a missing blob
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    /// The service reported something that is not a CID
    #[error("invalid cid: {0}")]
    InvalidCid(String),
    /// Local store failure
    #[error("content store error: {0}")]
    Store(String),
}

impl Transient for ContentError {
    fn is_transient(&self) -> bool {
        matches!(self, ContentError::Network(_))
    }
}

/// A content-addressable blob store
///
/// Implementations must not make a blob visible under its CID until the whole
///  upload has been accepted.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug {
    /// Upload `blob` under the friendly `name` and return its CID
    async fn put(&self, blob: Bytes, name: &str) -> Result<Cid, ContentError>;

    /// Fetch the blob pinned under `cid`
    async fn get(&self, cid: &Cid) -> Result<Bytes, ContentError>;
}

#[async_trait]
impl<T> ContentStore for Arc<T>
where
    T: ContentStore + ?Sized,
{
    async fn put(&self, blob: Bytes, name: &str) -> Result<Cid, ContentError> {
        (**self).put(blob, name).await
    }

    async fn get(&self, cid: &Cid) -> Result<Bytes, ContentError> {
        (**self).get(cid).await
    }
}

/**
 * Anchor registries: map an application key
 *  to the CID of its latest record.
 */
pub mod anchor;
/**
 * Local proof-of-work hash chain, one
 *  realisation of an anchor registry.
 */
pub mod chain;
/**
 * Content-addressable blob stores:
 *  a pinning service client and an
 *  in-memory store.
 */
pub mod content;
/**
 * Symmetric record encryption.
 *  AES-256-CBC with an HMAC-SHA-256 tag
 *  under HKDF derived subkeys.
 */
pub mod crypto;
/**
 * Thin wrapper around CIDs, how records
 *  are addressed in content stores.
 */
pub mod linked_data;
/**
 * The encrypt, pin, anchor pipeline
 *  and the index that lets records be
 *  read back by id.
 */
pub mod record;
/**
 * Retry and url helpers shared by the
 *  http backed clients.
 */
pub mod transport;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::anchor::{AnchorError, AnchorRegistry};
    pub use crate::chain::{ChainAnchorRegistry, HashChain, MiningConfig};
    pub use crate::content::{ContentError, ContentStore};
    pub use crate::crypto::{CipherBlob, CodecError, Secret};
    pub use crate::linked_data::{multibase, Cid, CidError};
    pub use crate::record::{RecordError, RecordIndex, RecordService, WrittenRecord};
    pub use crate::transport::RetryPolicy;
    pub use crate::version::BuildInfo;
}

//! Content identifiers for pinned blobs
//!
//! Blobs are addressed by CIDs. Locally computed CIDs are CIDv1 over the raw
//! codec with a sha2-256 multihash, which is what IPFS assigns to a raw-leaf
//! upload of the same bytes. CIDs reported by a remote pinning service are
//! parsed and carried as-is.

use sha2::{Digest, Sha256};

pub use cid::multibase;
pub use cid::Cid;
pub use cid::Error as CidError;

/// Multicodec code for raw binary
pub const RAW_CODEC: u64 = 0x55;
/// Multihash code for sha2-256
pub const SHA2_256_CODE: u64 = 0x12;

type Multihash = cid::multihash::Multihash<64>;

/// Derive the CID of `data`
///
/// Identical bytes always yield the identical CID.
pub fn content_cid(data: &[u8]) -> Cid {
    let digest = Sha256::digest(data);
    // a 32-byte digest always fits in a 64-byte multihash
    let mh = Multihash::wrap(SHA2_256_CODE, &digest).expect("sha2-256 digest fits multihash");
    Cid::new_v1(RAW_CODEC, mh)
}

/// Parse a CID from its string form (base58 v0 or multibase v1)
pub fn parse_cid(data: &str) -> Result<Cid, CidError> {
    Cid::try_from(data.trim())
}

/// Serde helpers that carry a [`Cid`] as its canonical string form
///
/// `cid`'s own serde impl encodes an IPLD link, which is not what JSON
/// documents and SQL rows expect.
pub mod cid_string {
    use super::Cid;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(cid: &Cid, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&cid.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cid, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_cid(&value).map_err(de::Error::custom)
    }

    /// Same, for an optional CID carried as a string or null
    pub mod option {
        use super::super::{parse_cid, Cid};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(cid: &Option<Cid>, serializer: S) -> Result<S::Ok, S::Error> {
            match cid {
                Some(cid) => serializer.serialize_some(&cid.to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Cid>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|value| parse_cid(&value))
                .transpose()
                .map_err(de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_cid_is_deterministic() {
        let a = content_cid(b"encrypted trip");
        let b = content_cid(b"encrypted trip");
        let c = content_cid(b"encrypted trip!");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.codec(), RAW_CODEC);
        assert_eq!(a.hash().code(), SHA2_256_CODE);
    }

    #[test]
    fn test_parse_round_trip() {
        let cid = content_cid(b"hello");
        let text = cid.to_string();
        assert!(text.starts_with('b'));
        assert_eq!(parse_cid(&text).unwrap(), cid);
    }

    #[test]
    fn test_parse_remote_cids() {
        let v0 = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        let v1 = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

        assert_eq!(parse_cid(v0).unwrap().to_string(), v0);
        assert_eq!(parse_cid(v1).unwrap().to_string(), v1);
        assert!(parse_cid("not-a-cid").is_err());
    }
}

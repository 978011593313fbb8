use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 of `data`
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Merkle root over a list of string leaves
///
/// Leaves are hashed first, then each level is reduced pairwise by hashing the
///  concatenation of the two hex digests. An odd level pairs its last node with
///  itself. The empty list has the empty root.
pub fn compute_merkle_root<L: AsRef<str>>(leaves: &[L]) -> String {
    if leaves.is_empty() {
        return String::new();
    }

    let mut level: Vec<String> = leaves.iter().map(|leaf| sha256_hex(leaf.as_ref())).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left.as_bytes());
                hasher.update(right.as_bytes());
                hex::encode(hasher.finalize())
            })
            .collect();
    }

    level.pop().unwrap_or_default()
}

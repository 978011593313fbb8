//! Symmetric codec for SafeTour records
//!
//! Every protected document (tourist profile, trip plan) is serialized to JSON and
//! encrypted with a shared 256-bit [`Secret`] before it leaves the process:
//!
//! - **Cipher**: AES-256 in CBC mode with PKCS#7 padding and a fresh random 16-byte IV
//!   per encryption, so the same document never produces the same ciphertext twice.
//! - **Authentication**: blobs carry an HMAC-SHA-256 tag over `iv || ciphertext`
//!   (encrypt-then-MAC). The cipher and MAC keys are separate HKDF-SHA-256 subkeys of
//!   the shared secret. A wrong key or a flipped bit is rejected before any padding
//!   is inspected.
//! - **Wire format**: `"<ivHex>:<ciphertextHex>:<tagHex>"`. Blobs written without a
//!   tag (`"<ivHex>:<ciphertextHex>"`, keyed directly with the shared secret) are
//!   still readable; for those only the padding check guards against a wrong key.

mod blob;
mod codec;
mod secret;

pub use blob::{CipherBlob, IV_SIZE, TAG_SIZE};
pub use codec::{decrypt, decrypt_json, encrypt, encrypt_json, encrypt_unauthenticated};
pub use secret::{Secret, SECRET_SIZE};

/// Errors raised by the symmetric codec
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Encryption could not run (bad key length, RNG failure)
    #[error("encryption error: {0}")]
    Encryption(String),
    /// The blob could not be decrypted with the supplied key
    ///  (tag mismatch, bad padding, bad key length)
    #[error("decryption error: {0}")]
    Decryption(String),
    /// The blob text is not a valid `iv:ciphertext[:tag]` encoding
    #[error("malformed cipher blob: {0}")]
    Malformed(String),
    /// Key material of the wrong size
    #[error("invalid key length, expected {SECRET_SIZE} bytes, got {0}")]
    InvalidKey(usize),
    /// The decrypted payload is not the expected JSON document
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

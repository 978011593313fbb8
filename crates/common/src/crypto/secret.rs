use std::fmt;
use std::ops::Deref;

use super::codec;
use super::{CipherBlob, CodecError};

/// Size of the shared record key in bytes (AES-256)
pub const SECRET_SIZE: usize = 32;

/// A 256-bit symmetric key shared by everyone allowed to read SafeTour records
///
/// Loaded from configuration or secret storage; there is intentionally no
/// built-in default.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
/// let blob = secret.encrypt(b"{\"destination\":\"Goa\"}")?;
/// let plaintext = secret.decrypt(&blob)?;
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_SIZE]);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using the system RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] if the slice is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() != SECRET_SIZE {
            return Err(CodecError::InvalidKey(data.len()));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Parse a hex encoded secret (64 hex characters, surrounding whitespace ignored)
    pub fn from_hex(data: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(data.trim())
            .map_err(|e| CodecError::Malformed(format!("invalid hex key: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Encrypt `data` into an authenticated [`CipherBlob`]
    pub fn encrypt(&self, data: &[u8]) -> Result<CipherBlob, CodecError> {
        codec::encrypt(data, self.bytes())
    }

    /// Decrypt a blob produced by [`Secret::encrypt`] (or an untagged legacy blob)
    pub fn decrypt(&self, blob: &CipherBlob) -> Result<Vec<u8>, CodecError> {
        codec::decrypt(blob, self.bytes())
    }
}

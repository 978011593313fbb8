use std::fmt;
use std::str::FromStr;

use super::CodecError;

/// Size of the CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;
/// Size of the HMAC-SHA-256 tag in bytes
pub const TAG_SIZE: usize = 32;

const SEPARATOR: char = ':';

/// An encrypted record as it is pinned to the content store
///
/// Created once per write and never mutated afterwards. The text form is
/// `"<ivHex>:<ciphertextHex>[:<tagHex>]"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherBlob {
    iv: [u8; IV_SIZE],
    ciphertext: Vec<u8>,
    tag: Option<[u8; TAG_SIZE]>,
}

impl CipherBlob {
    pub(crate) fn new(iv: [u8; IV_SIZE], ciphertext: Vec<u8>, tag: Option<[u8; TAG_SIZE]>) -> Self {
        Self {
            iv,
            ciphertext,
            tag,
        }
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> Option<&[u8; TAG_SIZE]> {
        self.tag.as_ref()
    }

    /// Whether the blob carries an authentication tag
    pub fn is_authenticated(&self) -> bool {
        self.tag.is_some()
    }

    /// Render the blob in its `iv:ciphertext[:tag]` hex form
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{}{}{}",
            hex::encode(self.iv),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        );
        if let Some(tag) = &self.tag {
            out.push(SEPARATOR);
            out.push_str(&hex::encode(tag));
        }
        out
    }

    /// Parse the `iv:ciphertext[:tag]` hex form
    pub fn parse(data: &str) -> Result<Self, CodecError> {
        let parts: Vec<&str> = data.trim().split(SEPARATOR).collect();
        let (iv_hex, ct_hex, tag_hex) = match parts.as_slice() {
            [iv, ct] => (*iv, *ct, None),
            [iv, ct, tag] => (*iv, *ct, Some(*tag)),
            _ => {
                return Err(CodecError::Malformed(format!(
                    "expected 2 or 3 '{}' separated parts, got {}",
                    SEPARATOR,
                    parts.len()
                )))
            }
        };

        let iv = decode_fixed::<IV_SIZE>(iv_hex, "iv")?;
        let ciphertext = hex::decode(ct_hex)
            .map_err(|e| CodecError::Malformed(format!("invalid ciphertext hex: {}", e)))?;
        if ciphertext.is_empty() {
            return Err(CodecError::Malformed("empty ciphertext".into()));
        }
        let tag = tag_hex
            .map(|tag| decode_fixed::<TAG_SIZE>(tag, "tag"))
            .transpose()?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
        })
    }

    /// The bytes that get uploaded to the content store
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// Parse bytes fetched back from the content store
    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| CodecError::Malformed("cipher blob is not utf-8".into()))?;
        Self::parse(text)
    }
}

fn decode_fixed<const N: usize>(data: &str, what: &str) -> Result<[u8; N], CodecError> {
    let bytes = hex::decode(data)
        .map_err(|e| CodecError::Malformed(format!("invalid {} hex: {}", what, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CodecError::Malformed(format!(
            "invalid {} length, expected {}, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

impl fmt::Display for CipherBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CipherBlob {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_untagged() {
        let text = format!("{}:{}", "ab".repeat(IV_SIZE), "cd".repeat(32));
        let blob = CipherBlob::parse(&text).unwrap();
        assert_eq!(blob.iv(), &[0xab; IV_SIZE]);
        assert_eq!(blob.ciphertext(), &[0xcd; 32][..]);
        assert!(!blob.is_authenticated());
        assert_eq!(blob.encode(), text);
    }

    #[test]
    fn test_parse_tagged() {
        let text = format!(
            "{}:{}:{}",
            "01".repeat(IV_SIZE),
            "02".repeat(16),
            "03".repeat(TAG_SIZE)
        );
        let blob: CipherBlob = text.parse().unwrap();
        assert_eq!(blob.tag(), Some(&[0x03; TAG_SIZE]));
        assert_eq!(blob.to_string(), text);
        assert_eq!(CipherBlob::from_bytes(text.as_bytes()).unwrap(), blob);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let iv = "00".repeat(IV_SIZE);
        let cases = [
            String::new(),
            "deadbeef".to_string(),
            format!("{}:zz", iv),
            format!("{}:", iv),
            format!("00:{}", "11".repeat(16)),
            format!("{}:{}:00", iv, "11".repeat(16)),
            format!("{}:{}:{}:{}", iv, "11".repeat(16), "22", "33"),
        ];
        for case in cases {
            assert!(
                matches!(CipherBlob::parse(&case), Err(CodecError::Malformed(_))),
                "expected malformed for {:?}",
                case
            );
        }
    }
}

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

use super::blob::{CipherBlob, IV_SIZE, TAG_SIZE};
use super::secret::{Secret, SECRET_SIZE};
use super::CodecError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const BLOCK_SIZE: usize = 16;
const CIPHER_KEY_INFO: &[u8] = b"safetour/record/v1/aes-256-cbc";
const MAC_KEY_INFO: &[u8] = b"safetour/record/v1/hmac-sha256";

struct Subkeys {
    cipher: [u8; SECRET_SIZE],
    mac: [u8; SECRET_SIZE],
}

fn derive_subkeys(key: &[u8]) -> Result<Subkeys, String> {
    let hk = Hkdf::<Sha256>::new(None, key);
    let mut cipher = [0u8; SECRET_SIZE];
    let mut mac = [0u8; SECRET_SIZE];
    hk.expand(CIPHER_KEY_INFO, &mut cipher)
        .map_err(|e| format!("hkdf expand failed: {}", e))?;
    hk.expand(MAC_KEY_INFO, &mut mac)
        .map_err(|e| format!("hkdf expand failed: {}", e))?;
    Ok(Subkeys { cipher, mac })
}

fn mac_for(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha256, String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|e| format!("invalid mac key: {}", e))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

fn random_iv() -> Result<[u8; IV_SIZE], CodecError> {
    let mut iv = [0u8; IV_SIZE];
    getrandom::getrandom(&mut iv)
        .map_err(|e| CodecError::Encryption(format!("failed to generate iv: {}", e)))?;
    Ok(iv)
}

fn check_encryption_key(key: &[u8]) -> Result<(), CodecError> {
    if key.len() != SECRET_SIZE {
        return Err(CodecError::Encryption(format!(
            "invalid key length, expected {}, got {}",
            SECRET_SIZE,
            key.len()
        )));
    }
    Ok(())
}

fn cbc_encrypt(
    cipher_key: &[u8],
    iv: &[u8; IV_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let cipher = Aes256CbcEnc::new_from_slices(cipher_key, iv)
        .map_err(|e| CodecError::Encryption(format!("invalid key or iv: {}", e)))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt(
    cipher_key: &[u8],
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CodecError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::Decryption(format!(
            "ciphertext length {} is not a multiple of the block size",
            ciphertext.len()
        )));
    }
    Aes256CbcDec::new_from_slices(cipher_key, iv)
        .map_err(|e| CodecError::Decryption(format!("invalid key or iv: {}", e)))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CodecError::Decryption("invalid padding (wrong key or corrupted data)".into()))
}

/// Encrypt `plaintext` with a 32-byte key into an authenticated blob
///
/// # Errors
///
/// [`CodecError::Encryption`] if `key` is not exactly 32 bytes or the system RNG fails.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<CipherBlob, CodecError> {
    check_encryption_key(key)?;
    let subkeys = derive_subkeys(key).map_err(CodecError::Encryption)?;
    let iv = random_iv()?;
    let ciphertext = cbc_encrypt(&subkeys.cipher, &iv, plaintext)?;

    let digest = mac_for(&subkeys.mac, &iv, &ciphertext)
        .map_err(CodecError::Encryption)?
        .finalize()
        .into_bytes();
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&digest);

    Ok(CipherBlob::new(iv, ciphertext, Some(tag)))
}

/// Encrypt without an authentication tag, keyed directly with `key`
///
/// Produces the `"<ivHex>:<ciphertextHex>"` format written by earlier SafeTour
/// deployments. Prefer [`encrypt`]; this exists for interoperability.
pub fn encrypt_unauthenticated(plaintext: &[u8], key: &[u8]) -> Result<CipherBlob, CodecError> {
    check_encryption_key(key)?;
    let iv = random_iv()?;
    let ciphertext = cbc_encrypt(key, &iv, plaintext)?;
    Ok(CipherBlob::new(iv, ciphertext, None))
}

/// Decrypt a blob with a 32-byte key
///
/// Tagged blobs are authenticated before decryption. Untagged blobs only get the
/// PKCS#7 padding check.
///
/// # Errors
///
/// [`CodecError::Decryption`] on a bad key length, tag mismatch or invalid padding.
pub fn decrypt(blob: &CipherBlob, key: &[u8]) -> Result<Vec<u8>, CodecError> {
    if key.len() != SECRET_SIZE {
        return Err(CodecError::Decryption(format!(
            "invalid key length, expected {}, got {}",
            SECRET_SIZE,
            key.len()
        )));
    }

    match blob.tag() {
        Some(tag) => {
            let subkeys = derive_subkeys(key).map_err(CodecError::Decryption)?;
            mac_for(&subkeys.mac, blob.iv(), blob.ciphertext())
                .map_err(CodecError::Decryption)?
                .verify_slice(tag)
                .map_err(|_| {
                    CodecError::Decryption(
                        "authentication failed (wrong key or tampered data)".into(),
                    )
                })?;
            cbc_decrypt(&subkeys.cipher, blob.iv(), blob.ciphertext())
        }
        None => cbc_decrypt(key, blob.iv(), blob.ciphertext()),
    }
}

/// Serialize `value` as JSON and encrypt it
pub fn encrypt_json<T: Serialize>(value: &T, secret: &Secret) -> Result<CipherBlob, CodecError> {
    let data = serde_json::to_vec(value)?;
    secret.encrypt(&data)
}

/// Decrypt a blob and parse the plaintext as JSON
///
/// An untagged blob opened with the wrong key passes the padding check now
///  and then, so for those a plaintext that does not parse is reported as
///  [`CodecError::Decryption`] rather than [`CodecError::Json`].
pub fn decrypt_json<T: DeserializeOwned>(
    blob: &CipherBlob,
    secret: &Secret,
) -> Result<T, CodecError> {
    let data = secret.decrypt(blob)?;
    serde_json::from_slice(&data).map_err(|e| {
        if blob.is_authenticated() {
            CodecError::Json(e)
        } else {
            CodecError::Decryption(format!("untagged blob did not decrypt to json: {}", e))
        }
    })
}

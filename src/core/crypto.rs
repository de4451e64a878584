//! Symmetric encryption primitive for the secret vault and encrypted
//! memories.
//!
//! AES-256-GCM keyed by the SHA-256 digest of a caller-supplied key string.
//! The key is supplied out-of-band on every call and never persisted.
//! Wire form: `enc:` + base64(nonce(12) || ciphertext+tag).

use crate::core::error::MnemoError;
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

const ENC_PREFIX: &str = "enc:";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn derive_cipher(key: &str) -> Aes256Gcm {
    let digest = Sha256::digest(key.as_bytes());
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest))
}

/// Encrypt `plaintext` under `key`. A fresh random nonce is drawn per call,
/// so repeated encryption of the same payload yields distinct ciphertexts.
pub fn encrypt(plaintext: &str, key: &str) -> Result<String, MnemoError> {
    let cipher = derive_cipher(key);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| MnemoError::DecryptionFailed)?;

    let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    packed.extend_from_slice(&nonce);
    packed.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENC_PREFIX, BASE64.encode(packed)))
}

/// Decrypt a value produced by [`encrypt`]. Fails with `DecryptionFailed`
/// on a wrong key, a truncated payload, or a tampered ciphertext.
pub fn decrypt(ciphertext: &str, key: &str) -> Result<String, MnemoError> {
    let encoded = ciphertext
        .strip_prefix(ENC_PREFIX)
        .ok_or(MnemoError::DecryptionFailed)?;

    let packed = BASE64
        .decode(encoded)
        .map_err(|_| MnemoError::DecryptionFailed)?;
    if packed.len() < NONCE_LEN + TAG_LEN {
        return Err(MnemoError::DecryptionFailed);
    }

    let (nonce_bytes, payload) = packed.split_at(NONCE_LEN);
    let cipher = derive_cipher(key);
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), payload)
        .map_err(|_| MnemoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| MnemoError::DecryptionFailed)
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENC_PREFIX)
}

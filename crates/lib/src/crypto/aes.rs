//! AES-256-GCM crypto service.
//!
//! Encrypts the JSON encoding of a tree value under AES-256-GCM with a
//! fresh random nonce per value, and emits the nonce-prefixed ciphertext as
//! base64 text. Any scalar or container value can be marked secret, not
//! just strings.

use aes_gcm::{
    aead::{Aead, AeadCore, OsRng},
    Aes256Gcm, Key, KeyInit, Nonce,
};
use base64ct::{Base64, Encoding};

use super::CryptoService;
use crate::value::Value;

/// Nonce length for AES-GCM (12 bytes standard)
const NONCE_LENGTH: usize = 12;

/// [`CryptoService`] backed by AES-256-GCM.
pub struct AesGcmCrypto {
    cipher: Aes256Gcm,
}

impl AesGcmCrypto {
    /// Creates a service from a 32-byte key. Key derivation (from a
    /// passphrase, a keyring, hardware) is the host's affair.
    pub fn new(key: &[u8; 32]) -> Self {
        AesGcmCrypto {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }
}

impl CryptoService for AesGcmCrypto {
    fn encrypt(&self, value: &Value) -> Value {
        let plaintext = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "cannot encode value for encryption");
                return Value::Null;
            }
        };

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = match self.cipher.encrypt(&nonce, plaintext.as_ref()) {
            Ok(ciphertext) => ciphertext,
            Err(err) => {
                tracing::warn!(error = %err, "value encryption failed");
                return Value::Null;
            }
        };

        let mut raw = nonce.to_vec();
        raw.extend_from_slice(&ciphertext);
        Value::Text(Base64::encode_string(&raw))
    }

    fn decrypt(&self, value: &Value) -> Value {
        let Value::Text(encoded) = value else {
            return Value::Null;
        };

        let raw = match Base64::decode_vec(encoded) {
            Ok(raw) if raw.len() > NONCE_LENGTH => raw,
            _ => return Value::Null,
        };

        let (nonce, ciphertext) = raw.split_at(NONCE_LENGTH);
        let plaintext = match self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => return Value::Null,
        };

        serde_json::from_slice(&plaintext).unwrap_or(Value::Null)
    }
}

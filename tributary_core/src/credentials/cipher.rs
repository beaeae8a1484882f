//! Credential ciphers.
//!
//! `AesGcmCipher` encrypts credential fields at rest with AES-256-GCM: the
//! payload is a random 12-byte nonce followed by the ciphertext of the JSON
//! encoded fields.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use serde_json::Value;

use crate::auth::CredentialFields;
use crate::credentials::traits::CredentialCipher;
use crate::{Error, Result};

const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::InvalidInput(format!("encryption key: {e}")))?;
        Ok(Self { cipher })
    }

    /// Build from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidInput(format!("encryption key is not base64: {e}")))?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "encryption key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Self::new(&key)
    }

    /// Random key, base64-encoded, suitable for `TRIBUTARY_ENCRYPTION_KEY`.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        BASE64.encode(key)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::BackendMessage(format!("encrypt: {e}")))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(Error::BackendMessage(
                "ciphertext too short (missing nonce)".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::BackendMessage(format!("decrypt: {e}")))
    }
}

#[async_trait]
impl CredentialCipher for AesGcmCipher {
    async fn encrypt(&self, fields: &CredentialFields) -> Result<Vec<u8>> {
        let plaintext =
            serde_json::to_vec(fields).map_err(|e| Error::backend("serialize credentials", e))?;
        self.seal(&plaintext)
    }

    async fn decrypt(&self, payload: &[u8]) -> Result<CredentialFields> {
        let plaintext = self.open(payload)?;
        fields_from_json(&plaintext)
    }
}

/// Stores fields as plain JSON. Development and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

#[async_trait]
impl CredentialCipher for PlaintextCipher {
    async fn encrypt(&self, fields: &CredentialFields) -> Result<Vec<u8>> {
        serde_json::to_vec(fields).map_err(|e| Error::backend("serialize credentials", e))
    }

    async fn decrypt(&self, payload: &[u8]) -> Result<CredentialFields> {
        fields_from_json(payload)
    }
}

fn fields_from_json(bytes: &[u8]) -> Result<CredentialFields> {
    match serde_json::from_slice(bytes).map_err(|e| Error::backend("deserialize credentials", e))? {
        Value::Object(fields) => Ok(fields),
        _ => Err(Error::BackendMessage(
            "decrypted credentials are not a JSON object".to_string(),
        )),
    }
}

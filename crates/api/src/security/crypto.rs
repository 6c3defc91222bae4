//! AES-256-GCM encryption of settled transaction payloads.
//!
//! The key is the SHA-256 digest of `TRANSACTION_ENCRYPTION_KEY`. Every
//! message gets a fresh random 96-bit nonce, and the transaction id is bound
//! as associated data so a ciphertext cannot be replayed onto another row.
//!
//! Stored form (the `transactions.encrypted_payload` column):
//!
//! ```json
//! { "version": 1, "nonce": "<base64>", "ciphertext": "<base64>" }
//! ```

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::SecretString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use thiserror::Error;

use shopbot_core::TransactionId;

use crate::config::secret_bytes;

/// Current envelope version.
pub const PAYLOAD_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;

/// Errors from encrypting or decrypting a payload.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The cipher could not be initialised.
    #[error("invalid encryption key")]
    InvalidKey,

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// Authentication failed: tampered data, wrong key or wrong transaction.
    #[error("decryption failed")]
    Decrypt,

    /// The stored envelope is malformed.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The envelope was written by an unknown format version.
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u8),

    /// The plaintext could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Versioned envelope around an encrypted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub version: u8,
    pub nonce: String,
    pub ciphertext: String,
}

/// Encrypts and decrypts transaction payloads.
#[derive(Clone)]
pub struct TransactionCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for TransactionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCipher").finish_non_exhaustive()
    }
}

impl TransactionCipher {
    /// Derive the cipher key from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the derived key is rejected.
    pub fn new(secret: &SecretString) -> Result<Self, CryptoError> {
        let key = Sha256::digest(secret_bytes(secret));
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` bound to transaction `id`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encrypt` if the AEAD rejects the input.
    pub fn encrypt(&self, id: TransactionId, plaintext: &[u8]) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let aad = id.as_uuid();
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let envelope = EncryptedPayload {
            version: PAYLOAD_VERSION,
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decrypt a stored envelope written for transaction `id`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Decrypt` on tampering, a wrong key or a wrong
    /// transaction id, and `CryptoError::Malformed` /
    /// `CryptoError::UnsupportedVersion` for envelopes this build cannot read.
    pub fn decrypt(&self, id: TransactionId, stored: &str) -> Result<Vec<u8>, CryptoError> {
        let envelope: EncryptedPayload =
            serde_json::from_str(stored).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        if envelope.version != PAYLOAD_VERSION {
            return Err(CryptoError::UnsupportedVersion(envelope.version));
        }

        let nonce_bytes = BASE64
            .decode(&envelope.nonce)
            .map_err(|e| CryptoError::Malformed(format!("nonce: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Malformed("nonce must be 12 bytes".to_string()));
        }
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| CryptoError::Malformed(format!("ciphertext: {e}")))?;

        let aad = id.as_uuid();
        self.cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Decrypt)
    }

    /// Serialize `value` as JSON and encrypt it.
    ///
    /// # Errors
    ///
    /// See [`TransactionCipher::encrypt`].
    pub fn encrypt_json<T: Serialize>(
        &self,
        id: TransactionId,
        value: &T,
    ) -> Result<String, CryptoError> {
        self.encrypt(id, &serde_json::to_vec(value)?)
    }

    /// Decrypt and deserialize a JSON payload.
    ///
    /// # Errors
    ///
    /// See [`TransactionCipher::decrypt`].
    pub fn decrypt_json<T: DeserializeOwned>(
        &self,
        id: TransactionId,
        stored: &str,
    ) -> Result<T, CryptoError> {
        let plaintext = self.decrypt(id, stored)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher(secret: &str) -> TransactionCipher {
        TransactionCipher::new(&SecretString::from(secret.to_string())).unwrap()
    }

    #[test]
    fn test_decrypts_what_it_encrypted() {
        let c = cipher("k3y-material-for-tests");
        let id = TransactionId::generate();
        let stored = c.encrypt(id, b"tx-hash=0xabc").unwrap();
        assert_eq!(c.decrypt(id, &stored).unwrap(), b"tx-hash=0xabc");
    }

    #[test]
    fn test_nonce_is_fresh_per_message() {
        let c = cipher("k3y-material-for-tests");
        let id = TransactionId::generate();
        let a = c.encrypt(id, b"same").unwrap();
        let b = c.encrypt(id, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let id = TransactionId::generate();
        let stored = cipher("first-key").encrypt(id, b"secret").unwrap();
        assert!(matches!(
            cipher("second-key").decrypt(id, &stored),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_wrong_transaction_fails() {
        let c = cipher("k3y-material-for-tests");
        let stored = c.encrypt(TransactionId::generate(), b"secret").unwrap();
        assert!(matches!(
            c.decrypt(TransactionId::generate(), &stored),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let c = cipher("k3y-material-for-tests");
        let id = TransactionId::generate();
        let stored = c.encrypt(id, b"secret").unwrap();

        let mut envelope: EncryptedPayload = serde_json::from_str(&stored).unwrap();
        let mut bytes = BASE64.decode(&envelope.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        envelope.ciphertext = BASE64.encode(bytes);
        let tampered = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(c.decrypt(id, &tampered), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let c = cipher("k3y-material-for-tests");
        let id = TransactionId::generate();
        let mut envelope: EncryptedPayload =
            serde_json::from_str(&c.encrypt(id, b"x").unwrap()).unwrap();
        envelope.version = 2;
        let stored = serde_json::to_string(&envelope).unwrap();

        assert!(matches!(
            c.decrypt(id, &stored),
            Err(CryptoError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_short_nonce_is_malformed() {
        let c = cipher("k3y-material-for-tests");
        let stored = serde_json::json!({
            "version": 1,
            "nonce": BASE64.encode([0u8; 4]),
            "ciphertext": BASE64.encode([0u8; 32]),
        })
        .to_string();
        assert!(matches!(
            c.decrypt(TransactionId::generate(), &stored),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn test_json_helpers() {
        let c = cipher("k3y-material-for-tests");
        let id = TransactionId::generate();
        let value = serde_json::json!({ "tx_hash": "0xabc", "amount": "9.99" });
        let stored = c.encrypt_json(id, &value).unwrap();
        let back: serde_json::Value = c.decrypt_json(id, &stored).unwrap();
        assert_eq!(back, value);
    }
}

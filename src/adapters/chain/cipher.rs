//! Wallet Key Encryption
//!
//! Private keys are stored as ChaCha20-Poly1305 ciphertext, base64 encoded
//! with the random nonce prefixed, so a leaked store file does not leak
//! signing capability. The 32-byte key comes from the environment as hex.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use thiserror::Error;

/// Nonce length for ChaCha20-Poly1305.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("encryption key must be 32 bytes of hex, got {0} bytes")]
    BadKeyLength(usize),

    #[error("encryption key is not valid hex: {0}")]
    BadKeyEncoding(String),

    #[error("ciphertext is not valid base64: {0}")]
    BadCiphertextEncoding(String),

    #[error("ciphertext too short to carry a nonce")]
    Truncated,

    #[error("decryption failed (wrong key or corrupted record)")]
    DecryptFailed,

    #[error("encryption failed")]
    EncryptFailed,
}

/// Symmetric cipher for wallet keys at rest.
#[derive(Clone)]
pub struct KeyCipher {
    cipher: ChaCha20Poly1305,
}

impl KeyCipher {
    pub fn from_key(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Parse a 64-character hex key, e.g. from `WALLET_ENCRYPTION_KEY`.
    pub fn from_hex_key(hex_key: &str) -> Result<Self, CipherError> {
        let bytes =
            hex::decode(hex_key.trim()).map_err(|e| CipherError::BadKeyEncoding(e.to_string()))?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CipherError::BadKeyLength(bytes.len()))?;
        Ok(Self::from_key(key))
    }

    /// Encrypt with a fresh random nonce; output is `base64(nonce || ct)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::EncryptFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, CipherError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| CipherError::BadCiphertextEncoding(e.to_string()))?;
        if combined.len() <= NONCE_LEN {
            return Err(CipherError::Truncated);
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::DecryptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> KeyCipher {
        KeyCipher::from_key([7u8; 32])
    }

    #[test]
    fn test_round_trip() {
        let secret = b"super secret signing key material";
        let encoded = cipher().encrypt(secret).unwrap();
        assert_eq!(cipher().decrypt(&encoded).unwrap(), secret);
    }

    #[test]
    fn test_nonce_varies_per_encryption() {
        let encoded_a = cipher().encrypt(b"same input").unwrap();
        let encoded_b = cipher().encrypt(b"same input").unwrap();
        assert_ne!(encoded_a, encoded_b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encoded = cipher().encrypt(b"payload").unwrap();
        let other = KeyCipher::from_key([8u8; 32]);
        assert!(matches!(
            other.decrypt(&encoded),
            Err(CipherError::DecryptFailed)
        ));
    }

    #[test]
    fn test_hex_key_parsing() {
        let hex_key = "07".repeat(32);
        let parsed = KeyCipher::from_hex_key(&hex_key).unwrap();
        let encoded = cipher().encrypt(b"cross-check").unwrap();
        assert_eq!(parsed.decrypt(&encoded).unwrap(), b"cross-check");

        assert!(matches!(
            KeyCipher::from_hex_key("0011"),
            Err(CipherError::BadKeyLength(2))
        ));
        assert!(matches!(
            KeyCipher::from_hex_key("zz"),
            Err(CipherError::BadKeyEncoding(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let short = BASE64.encode([1u8; 8]);
        assert!(matches!(
            cipher().decrypt(&short),
            Err(CipherError::Truncated)
        ));
    }
}

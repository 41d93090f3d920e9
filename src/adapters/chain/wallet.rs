//! Per-user signing wallet

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use thiserror::Error;

use super::cipher::{CipherError, KeyCipher};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid keypair bytes: {0}")]
    InvalidKeypair(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Signing capability plus derived address for one user.
pub struct UserWallet {
    keypair: Keypair,
}

impl UserWallet {
    /// Generate a fresh random wallet (first contact).
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let keypair =
            Keypair::try_from(bytes).map_err(|e| WalletError::InvalidKeypair(e.to_string()))?;
        Ok(Self { keypair })
    }

    /// Decrypt a stored record into a usable wallet.
    pub fn from_encrypted(encrypted_key: &str, cipher: &KeyCipher) -> Result<Self, WalletError> {
        let bytes = cipher.decrypt(encrypted_key)?;
        Self::from_bytes(&bytes)
    }

    /// Encrypt the signing key for durable storage.
    pub fn to_encrypted(&self, cipher: &KeyCipher) -> Result<String, WalletError> {
        Ok(cipher.encrypt(&self.keypair.to_bytes())?)
    }

    /// Base58 address string.
    pub fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl Clone for UserWallet {
    fn clone(&self) -> Self {
        Self {
            keypair: Keypair::try_from(&self.keypair.to_bytes()[..]).unwrap(),
        }
    }
}

impl std::fmt::Debug for UserWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never expose key material through Debug
        f.debug_struct("UserWallet")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_has_base58_address() {
        let wallet = UserWallet::generate();
        let address = wallet.address();
        assert!(!address.is_empty());
        assert!(address.len() >= 32 && address.len() <= 44);
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let cipher = KeyCipher::from_key([3u8; 32]);
        let wallet = UserWallet::generate();

        let encrypted = wallet.to_encrypted(&cipher).unwrap();
        let restored = UserWallet::from_encrypted(&encrypted, &cipher).unwrap();
        assert_eq!(wallet.address(), restored.address());
    }

    #[test]
    fn test_wrong_cipher_key_is_fatal() {
        let wallet = UserWallet::generate();
        let encrypted = wallet.to_encrypted(&KeyCipher::from_key([1u8; 32])).unwrap();
        let result = UserWallet::from_encrypted(&encrypted, &KeyCipher::from_key([2u8; 32]));
        assert!(result.is_err());
    }

    #[test]
    fn test_sign_message_length() {
        let wallet = UserWallet::generate();
        let signature = wallet.sign_message(b"order payload");
        assert_eq!(signature.as_ref().len(), 64);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let wallet = UserWallet::generate();
        let rendered = format!("{wallet:?}");
        assert!(rendered.contains(&wallet.address()));
        assert!(!rendered.contains("keypair"));
    }
}

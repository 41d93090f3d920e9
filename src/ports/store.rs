//! Durable wallet store boundary
//!
//! The system of record for per-user wallets and preferences. The session
//! store is its only writer for wallet records; preference updates come from
//! the settings surface. Records are never deleted by the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::chat::UserId;

/// Per-user trading preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Slippage tolerance in basis points.
    pub slippage_bps: u16,
    /// Whether the user receives proactive notifications.
    pub notifications: bool,
    /// Terms-of-use acceptance gate.
    pub accepted_terms: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            slippage_bps: 100,
            notifications: true,
            accepted_terms: false,
        }
    }
}

/// Persisted wallet identity for one user. Created exactly once, on first
/// contact; the private key is stored encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub user_id: UserId,
    /// Base64 nonce-prefixed AEAD ciphertext of the signing key.
    pub encrypted_key: String,
    /// Derived public address.
    pub address: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// CRUD surface over the durable store. Absence is a value, not an error.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn wallet_by_user(&self, user: UserId) -> Result<Option<WalletRecord>, StoreError>;

    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), StoreError>;

    async fn preferences(&self, user: UserId) -> Result<Option<Preferences>, StoreError>;

    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError>;
}

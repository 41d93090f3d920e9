//! Chain read/transfer boundary
//!
//! Balance snapshots feed the router's post-failure safety check and the
//! flows' holdings listings; the transfer primitive backs the withdraw flow.
//! Venue execution does not pass through here.

use async_trait::async_trait;
use thiserror::Error;

use crate::adapters::chain::UserWallet;
use crate::domain::AssetId;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc fault: {0}")]
    Network(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transfer rejected: {0}")]
    Execution(String),

    /// The amount cannot cover the network fee it must carry.
    #[error("amount does not cover the network fee")]
    FeeExceedsAmount,
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Network(_))
    }
}

/// Read-only balance access for one owner address.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Balance of `asset` held by `owner`, in base units. Unknown accounts
    /// read as zero.
    async fn balance_of(&self, owner: &str, asset: &AssetId) -> Result<u64, ChainError>;
}

/// Direct transfer out of a user wallet, with the network fee deducted from
/// the sent amount so the wallet is never left unable to pay it.
#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Send `amount` base units of `asset` to `destination`, returning the
    /// transaction id. Fails with [`ChainError::FeeExceedsAmount`] when the
    /// fee-adjusted amount would be zero or negative.
    async fn transfer(
        &self,
        wallet: &UserWallet,
        destination: &str,
        asset: &AssetId,
        amount: u64,
    ) -> Result<String, ChainError>;

    /// Whether `address` is a syntactically valid destination on this chain.
    fn is_valid_address(&self, address: &str) -> bool;
}

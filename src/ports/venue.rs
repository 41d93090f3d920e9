//! Venue capability
//!
//! A venue is an independent liquidity source that can preview and execute a
//! swap. The two liquidity models (shared pools vs. issuance curves) share
//! one contract; the router only ever speaks this trait. Error kinds are
//! structured so routing decisions never match on message text.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::adapters::chain::UserWallet;
use crate::domain::{AssetId, TokenInfo};

/// Liquidity model of a venue; determines which asset classes it may route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueKind {
    /// Shared liquidity reserves (AMM pools).
    Pooled,
    /// Deterministic issuance curve, pre-migration.
    BondingCurve,
}

#[derive(Debug, Error)]
pub enum VenueError {
    /// No path exists between the two assets on this venue. The router
    /// skips to the next venue.
    #[error("no route on venue for {0} -> {1}")]
    RouteUnavailable(AssetId, AssetId),

    /// The venue does not know the asset at all. Resolver probes treat this
    /// as a definitive negative answer from this venue.
    #[error("asset not listed on venue: {0}")]
    AssetNotFound(AssetId),

    /// Submission was attempted and rejected (by the venue or on-chain).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Transport-level fault (timeout, connection loss, 5xx). Transient;
    /// the retry policy owns these.
    #[error("network fault: {0}")]
    Network(String),

    /// The venue answered but the payload was not understood.
    #[error("malformed venue response: {0}")]
    Protocol(String),
}

impl VenueError {
    /// Definitive "this venue cannot serve this asset/pair" answers, as
    /// opposed to faults that leave the question open.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VenueError::RouteUnavailable(_, _) | VenueError::AssetNotFound(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, VenueError::Network(_))
    }
}

/// Outcome of a submitted trade.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    /// Chain transaction id reported by the venue.
    pub tx_id: String,
    /// Realized output in the destination asset's base units.
    pub amount_out: u64,
}

/// Polymorphic capability over an independent liquidity source.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Stable display name; also the registration key used for tie-breaks.
    fn name(&self) -> &str;

    fn kind(&self) -> VenueKind;

    /// Deterministic output preview. No state mutation.
    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<u64, VenueError>;

    /// Output per one canonical unit of `asset_in`, for valuation display.
    async fn rate(&self, asset_in: &AssetId, asset_out: &AssetId) -> Result<Decimal, VenueError>;

    /// Submit the trade. `min_amount_out` is the slippage floor computed by
    /// the router; the venue must not settle below it.
    async fn execute(
        &self,
        wallet: &UserWallet,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<ExecutionReceipt, VenueError>;

    /// Metadata probe used by the resolver for assets missing from the
    /// verified registry.
    async fn token_info(&self, asset: &AssetId) -> Result<TokenInfo, VenueError>;
}

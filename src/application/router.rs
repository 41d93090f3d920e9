//! Best-rate swap routing
//!
//! Quotes every eligible venue concurrently, picks the strictly greatest
//! output (ties to the earliest-registered venue), applies the service fee
//! and slippage floor, and executes against the winner. A failed execution
//! is re-checked against a pre-execution balance snapshot of the destination
//! asset: if the balance rose anyway, the swap is reported as successful.
//! That heuristic compensates for confirm-timeout races where the chain
//! accepted the transaction; it is a best-effort approximation, not a
//! guarantee (an unrelated inbound transfer during the window also trips it).

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::adapters::chain::UserWallet;
use crate::domain::amount::{to_base_units, to_readable, to_readable_or_zero, AmountError};
use crate::domain::slippage::{min_output_floor, validate_bps, SlippageError};
use crate::domain::token::{AssetId, TokenInfo};
use crate::ports::chain::{BalanceReader, ChainError};
use crate::ports::venue::{Venue, VenueError, VenueKind};

use super::resolver::{ResolveError, TokenInfoResolver};
use super::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("slippage tolerance out of range: {0} bps")]
    InvalidSlippage(u16),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("assets belong to different venue classes; route through an intermediate")]
    MixedClassPair,

    #[error("no venue can serve this pair")]
    NoRoute,

    #[error("slippage and fee deductions exhaust the quoted output")]
    SlippageExhausted,

    #[error("execution failed on {venue}: {reason}")]
    ExecutionFailed { venue: String, reason: String },

    #[error("balance read failed: {0}")]
    Balance(#[from] ChainError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Winning quote for a routing request.
#[derive(Debug, Clone)]
pub struct RoutedQuote {
    pub venue: String,
    venue_index: usize,
    /// Input converted to base units of the source asset.
    pub amount_in: u64,
    /// Projected output in base units of the destination asset.
    pub amount_out: u64,
    pub info_in: TokenInfo,
    pub info_out: TokenInfo,
}

impl RoutedQuote {
    /// Projected output as a readable amount (dust suppressed).
    pub fn amount_out_readable(&self, dust_threshold: Decimal) -> Decimal {
        to_readable_or_zero(self.amount_out, self.info_out.decimals, dust_threshold)
    }
}

/// Result of an executed (or recovered) swap.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub venue: String,
    /// Absent when success was inferred from the balance delta.
    pub tx_id: Option<String>,
    /// Realized output, readable units of the destination asset.
    pub amount_out: Decimal,
    /// True when the venue reported failure but the destination balance rose.
    pub recovered: bool,
}

/// One asset position held by the session wallet.
#[derive(Debug, Clone)]
pub struct Holding {
    pub asset_id: AssetId,
    /// Resolved metadata; absent when resolution failed for a held asset.
    pub info: Option<TokenInfo>,
    pub units: u64,
    /// Readable amount; raw base units when metadata is unavailable.
    pub amount: Decimal,
}

impl Holding {
    pub fn symbol(&self) -> String {
        match &self.info {
            Some(info) => info.symbol.clone(),
            None => self.asset_id.to_string(),
        }
    }
}

/// Venue-aggregating swap engine bound to one wallet.
pub struct SwapRouter {
    venues: Vec<Arc<dyn Venue>>,
    resolver: Arc<TokenInfoResolver>,
    chain: Arc<dyn BalanceReader>,
    wallet: Arc<UserWallet>,
    /// The asset curve pairs trade against; allowed in both venue sets.
    trade_asset: AssetId,
    service_fee_bps: u16,
    dust_threshold: Decimal,
    retry: RetryPolicy,
}

impl SwapRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venues: Vec<Arc<dyn Venue>>,
        resolver: Arc<TokenInfoResolver>,
        chain: Arc<dyn BalanceReader>,
        wallet: Arc<UserWallet>,
        trade_asset: AssetId,
        service_fee_bps: u16,
        dust_threshold: Decimal,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            venues,
            resolver,
            chain,
            wallet,
            trade_asset,
            service_fee_bps,
            dust_threshold,
            retry,
        }
    }

    pub fn wallet_address(&self) -> String {
        self.wallet.address()
    }

    pub fn trade_asset(&self) -> &AssetId {
        &self.trade_asset
    }

    pub fn dust_threshold(&self) -> Decimal {
        self.dust_threshold
    }

    /// Venue sets an asset may route through. The trade asset bridges both
    /// worlds: curve pairs are always quoted against it.
    fn permitted_kinds(&self, info: &TokenInfo) -> (bool, bool) {
        let pooled = info.class.is_pooled_tradable();
        let curve = info.class == crate::domain::TradabilityClass::BondingCurve
            || info.asset_id == self.trade_asset;
        (pooled, curve)
    }

    fn eligible_kind(&self, a: &TokenInfo, b: &TokenInfo) -> Result<VenueKind, RouterError> {
        let (a_pooled, a_curve) = self.permitted_kinds(a);
        let (b_pooled, b_curve) = self.permitted_kinds(b);
        // curve listings win the overlap: a pair involving a curve asset can
        // only settle on a curve venue
        if a_curve && b_curve && (!a_pooled || !b_pooled) {
            Ok(VenueKind::BondingCurve)
        } else if a_pooled && b_pooled {
            Ok(VenueKind::Pooled)
        } else {
            Err(RouterError::MixedClassPair)
        }
    }

    /// Resolved metadata for one asset (registry, cache, or venue probes).
    pub async fn token_info(&self, asset: &AssetId) -> Result<TokenInfo, RouterError> {
        Ok(self.resolver.resolve(asset).await?)
    }

    /// Best quote across all eligible venues for a readable input amount.
    pub async fn quote_best(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: Decimal,
    ) -> Result<RoutedQuote, RouterError> {
        let info_in = self.resolver.resolve(asset_in).await?;
        let info_out = self.resolver.resolve(asset_out).await?;
        let kind = self.eligible_kind(&info_in, &info_out)?;
        let amount_units = to_base_units(amount_in, info_in.decimals)?;

        let eligible: Vec<(usize, &Arc<dyn Venue>)> = self
            .venues
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind() == kind)
            .collect();

        let quotes = join_all(eligible.iter().map(|(index, venue)| async move {
            let result = self
                .retry
                .run_network(|| venue.quote(asset_in, asset_out, amount_units))
                .await;
            (*index, result)
        }))
        .await;

        let mut best: Option<(usize, u64)> = None;
        for (index, result) in quotes {
            match result {
                Ok(amount_out) => {
                    // strict comparison keeps the earliest-registered venue on ties
                    if best.map_or(true, |(_, current)| amount_out > current) {
                        best = Some((index, amount_out));
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(venue = self.venues[index].name(), error = %e, "venue skipped");
                }
                Err(e) => {
                    tracing::warn!(venue = self.venues[index].name(), error = %e, "quote failed");
                }
            }
        }

        let (venue_index, amount_out) = best.ok_or(RouterError::NoRoute)?;
        Ok(RoutedQuote {
            venue: self.venues[venue_index].name().to_string(),
            venue_index,
            amount_in: amount_units,
            amount_out,
            info_in,
            info_out,
        })
    }

    /// Execute a collected [`SwapRequest`].
    pub async fn execute_request(
        &self,
        request: &crate::domain::SwapRequest,
    ) -> Result<SwapOutcome, RouterError> {
        self.execute(
            &request.asset_in,
            &request.asset_out,
            request.amount_in,
            request.slippage_bps,
        )
        .await
    }

    /// Quote and execute against the winning venue.
    pub async fn execute(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: Decimal,
        slippage_bps: u16,
    ) -> Result<SwapOutcome, RouterError> {
        validate_bps(slippage_bps).map_err(|_| RouterError::InvalidSlippage(slippage_bps))?;

        let routed = self.quote_best(asset_in, asset_out, amount_in).await?;
        let floor = min_output_floor(routed.amount_out, slippage_bps, self.service_fee_bps)
            .map_err(|e| match e {
                SlippageError::Exhausted => RouterError::SlippageExhausted,
                SlippageError::InvalidBps(bps) | SlippageError::InvalidFeeBps(bps) => {
                    RouterError::InvalidSlippage(bps)
                }
            })?;

        let owner = self.wallet.address();
        let before = self.chain.balance_of(&owner, asset_out).await?;

        let venue = &self.venues[routed.venue_index];
        tracing::info!(
            venue = venue.name(),
            %asset_in,
            %asset_out,
            amount_in = routed.amount_in,
            quoted_out = routed.amount_out,
            floor,
            "executing swap"
        );

        match venue
            .execute(&self.wallet, asset_in, asset_out, routed.amount_in, floor)
            .await
        {
            Ok(receipt) => Ok(SwapOutcome {
                venue: routed.venue,
                tx_id: Some(receipt.tx_id),
                amount_out: to_readable_or_zero(
                    receipt.amount_out,
                    routed.info_out.decimals,
                    self.dust_threshold,
                ),
                recovered: false,
            }),
            Err(error) => self.recover_from_failure(routed, before, error).await,
        }
    }

    /// Confirm-timeout compensation: a destination balance that rose past the
    /// pre-execution snapshot means the chain accepted the trade even though
    /// the venue reported failure.
    async fn recover_from_failure(
        &self,
        routed: RoutedQuote,
        balance_before: u64,
        error: VenueError,
    ) -> Result<SwapOutcome, RouterError> {
        let owner = self.wallet.address();
        let after = self
            .chain
            .balance_of(&owner, &routed.info_out.asset_id)
            .await?;

        if after > balance_before {
            tracing::warn!(
                venue = %routed.venue,
                error = %error,
                delta = after - balance_before,
                "venue reported failure but destination balance rose; treating swap as settled"
            );
            return Ok(SwapOutcome {
                venue: routed.venue,
                tx_id: None,
                amount_out: to_readable_or_zero(
                    after - balance_before,
                    routed.info_out.decimals,
                    self.dust_threshold,
                ),
                recovered: true,
            });
        }

        Err(RouterError::ExecutionFailed {
            venue: routed.venue,
            reason: error.to_string(),
        })
    }

    /// Valuation rate from the first eligible venue that can serve the pair.
    pub async fn rate(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
    ) -> Result<Decimal, RouterError> {
        let info_in = self.resolver.resolve(asset_in).await?;
        let info_out = self.resolver.resolve(asset_out).await?;
        let kind = self.eligible_kind(&info_in, &info_out)?;

        for venue in self.venues.iter().filter(|v| v.kind() == kind) {
            match self
                .retry
                .run_network(|| venue.rate(asset_in, asset_out))
                .await
            {
                Ok(rate) => return Ok(rate),
                Err(e) => {
                    tracing::debug!(venue = venue.name(), error = %e, "rate unavailable");
                }
            }
        }
        Err(RouterError::NoRoute)
    }

    /// Wallet balance of one asset, readable units with dust suppressed.
    pub async fn balance_of(&self, asset: &AssetId) -> Result<Decimal, RouterError> {
        let owner = self.wallet.address();
        let units = self.chain.balance_of(&owner, asset).await?;
        match self.resolver.resolve(asset).await {
            Ok(info) => Ok(to_readable_or_zero(
                units,
                info.decimals,
                self.dust_threshold,
            )),
            Err(_) => Ok(Decimal::from(units)),
        }
    }

    /// All nonzero holdings of the session wallet, over the assets the
    /// resolver currently knows. Metadata failures degrade to the raw id and
    /// raw units rather than hiding the position.
    pub async fn balances(&self) -> Result<Vec<Holding>, RouterError> {
        let owner = self.wallet.address();
        let mut candidates = self.resolver.known_assets();
        if !candidates.contains(&self.trade_asset) {
            candidates.insert(0, self.trade_asset.clone());
        }

        let reads = join_all(candidates.iter().map(|asset| {
            let owner = owner.clone();
            async move { (asset.clone(), self.chain.balance_of(&owner, asset).await) }
        }))
        .await;

        let mut holdings = Vec::new();
        for (asset, result) in reads {
            let units = match result {
                Ok(units) if units > 0 => units,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(%asset, error = %e, "balance read failed; skipping asset");
                    continue;
                }
            };

            let holding = match self.resolver.resolve(&asset).await {
                Ok(info) => {
                    let amount = to_readable(units, info.decimals);
                    if amount < self.dust_threshold {
                        continue;
                    }
                    Holding {
                        asset_id: asset,
                        info: Some(info),
                        units,
                        amount,
                    }
                }
                Err(e) => {
                    tracing::info!(%asset, error = %e, "metadata unavailable for held asset");
                    Holding {
                        asset_id: asset,
                        info: None,
                        units,
                        amount: Decimal::from(units),
                    }
                }
            };
            holdings.push(holding);
        }
        Ok(holdings)
    }
}

//! Pooled-venue HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::adapters::chain::UserWallet;
use crate::domain::{AssetId, TokenInfo, TradabilityClass};
use crate::ports::venue::{ExecutionReceipt, Venue, VenueError, VenueKind};

use super::types::{
    error_codes, PoolAssetResponse, PoolErrorResponse, PoolQuoteResponse, PoolRateResponse,
    PoolSwapRequest, PoolSwapResponse,
};

/// Pool-derived symbols carry this suffix and are reduced to the pool's
/// first leg for display.
const LP_SYMBOL_SUFFIX: &str = "-LP";

/// Pooled venue configuration.
#[derive(Debug, Clone)]
pub struct AmmVenueConfig {
    /// Display name; also the router registration key.
    pub name: String,
    pub api_url: String,
    pub api_key: Option<String>,
    /// High-liquidity hop asset tried first when a direct pool is missing.
    pub base_asset: AssetId,
    /// Stable-value hop asset tried second.
    pub stable_asset: AssetId,
    pub timeout: Duration,
}

/// HTTP client for a pool-based liquidity venue.
pub struct AmmVenue {
    config: AmmVenueConfig,
    http: Client,
}

impl AmmVenue {
    pub fn new(config: AmmVenueConfig) -> Result<Self, VenueError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VenueError::Protocol(format!("failed to build http client: {e}")))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Hop sequence: direct pair, then the base asset, then the stable asset.
    /// Hops that coincide with either endpoint are skipped.
    fn fallback_hops(&self, asset_in: &AssetId, asset_out: &AssetId) -> Vec<Option<AssetId>> {
        let mut hops = vec![None];
        for hop in [&self.config.base_asset, &self.config.stable_asset] {
            if hop != asset_in && hop != asset_out {
                hops.push(Some(hop.clone()));
            }
        }
        hops
    }

    fn map_send_error(e: reqwest::Error) -> VenueError {
        VenueError::Network(e.to_string())
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
        asset_in: &AssetId,
        asset_out: &AssetId,
    ) -> Result<T, VenueError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| VenueError::Protocol(format!("failed to parse response: {e}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(VenueError::Network(format!("venue returned {status}")));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<PoolErrorResponse>(&body) {
            Ok(err) => match err.error.as_str() {
                error_codes::POOL_NOT_FOUND => Err(VenueError::RouteUnavailable(
                    asset_in.clone(),
                    asset_out.clone(),
                )),
                error_codes::ASSET_NOT_FOUND => Err(VenueError::AssetNotFound(asset_in.clone())),
                error_codes::SLIPPAGE_EXCEEDED => Err(VenueError::ExecutionFailed(format!(
                    "slippage floor not met: {}",
                    err.message
                ))),
                other => Err(VenueError::Protocol(format!("{other}: {}", err.message))),
            },
            Err(_) => Err(VenueError::Protocol(format!("status {status}: {body}"))),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        asset_in: &AssetId,
        asset_out: &AssetId,
    ) -> Result<T, VenueError> {
        let mut request = self.http.get(self.url(path)).query(query);
        if let Some(ref key) = self.config.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(Self::map_send_error)?;
        Self::handle_response(response, asset_in, asset_out).await
    }

    async fn quote_leg(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        via: Option<&AssetId>,
        amount_in: u64,
    ) -> Result<u64, VenueError> {
        let mut query = vec![
            ("in", asset_in.to_string()),
            ("out", asset_out.to_string()),
            ("amount", amount_in.to_string()),
        ];
        if let Some(via) = via {
            query.push(("via", via.to_string()));
        }

        let quote: PoolQuoteResponse = self
            .get_json("pools/quote", &query, asset_in, asset_out)
            .await?;
        match quote.output_amount() {
            Some(out) if out > 0 => Ok(out),
            Some(_) => Err(VenueError::Protocol("venue quoted zero output".into())),
            None => Err(VenueError::Protocol(format!(
                "unparseable quote amount: {}",
                quote.amount_out
            ))),
        }
    }

    async fn rate_leg(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        via: Option<&AssetId>,
    ) -> Result<Decimal, VenueError> {
        let mut query = vec![("in", asset_in.to_string()), ("out", asset_out.to_string())];
        if let Some(via) = via {
            query.push(("via", via.to_string()));
        }

        let response: PoolRateResponse = self
            .get_json("pools/rate", &query, asset_in, asset_out)
            .await?;
        let rate: Decimal = response
            .rate
            .parse()
            .map_err(|_| VenueError::Protocol(format!("unparseable rate: {}", response.rate)))?;
        if rate <= Decimal::ZERO {
            return Err(VenueError::Protocol("venue returned non-positive rate".into()));
        }
        Ok(rate)
    }

    async fn execute_leg(
        &self,
        wallet: &UserWallet,
        asset_in: &AssetId,
        asset_out: &AssetId,
        via: Option<&AssetId>,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<ExecutionReceipt, VenueError> {
        let order = format!("{asset_in}:{asset_out}:{amount_in}:{min_amount_out}");
        let body = PoolSwapRequest {
            asset_in: asset_in.to_string(),
            asset_out: asset_out.to_string(),
            amount_in: amount_in.to_string(),
            min_amount_out: min_amount_out.to_string(),
            via: via.map(|v| v.to_string()),
            wallet: wallet.address(),
            signature: wallet.sign_message(order.as_bytes()).to_string(),
        };

        let mut request = self.http.post(self.url("swap")).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(Self::map_send_error)?;
        let submitted: PoolSwapResponse =
            Self::handle_response(response, asset_in, asset_out).await?;

        let amount_out = submitted.amount_out.parse().map_err(|_| {
            VenueError::Protocol(format!("unparseable settled amount: {}", submitted.amount_out))
        })?;
        Ok(ExecutionReceipt {
            tx_id: submitted.tx_id,
            amount_out,
        })
    }
}

#[async_trait]
impl Venue for AmmVenue {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> VenueKind {
        VenueKind::Pooled
    }

    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<u64, VenueError> {
        let mut last = None;
        for via in self.fallback_hops(asset_in, asset_out) {
            match self.quote_leg(asset_in, asset_out, via.as_ref(), amount_in).await {
                Err(e @ VenueError::RouteUnavailable(_, _)) => last = Some(e),
                other => return other,
            }
        }
        Err(last
            .unwrap_or_else(|| VenueError::RouteUnavailable(asset_in.clone(), asset_out.clone())))
    }

    async fn rate(&self, asset_in: &AssetId, asset_out: &AssetId) -> Result<Decimal, VenueError> {
        let mut last = None;
        for via in self.fallback_hops(asset_in, asset_out) {
            match self.rate_leg(asset_in, asset_out, via.as_ref()).await {
                Err(e @ VenueError::RouteUnavailable(_, _)) => last = Some(e),
                other => return other,
            }
        }
        Err(last
            .unwrap_or_else(|| VenueError::RouteUnavailable(asset_in.clone(), asset_out.clone())))
    }

    async fn execute(
        &self,
        wallet: &UserWallet,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<ExecutionReceipt, VenueError> {
        let mut last = None;
        for via in self.fallback_hops(asset_in, asset_out) {
            match self
                .execute_leg(wallet, asset_in, asset_out, via.as_ref(), amount_in, min_amount_out)
                .await
            {
                Err(e @ VenueError::RouteUnavailable(_, _)) => last = Some(e),
                other => return other,
            }
        }
        Err(last
            .unwrap_or_else(|| VenueError::RouteUnavailable(asset_in.clone(), asset_out.clone())))
    }

    async fn token_info(&self, asset: &AssetId) -> Result<TokenInfo, VenueError> {
        let response: PoolAssetResponse = self
            .get_json(&format!("assets/{asset}"), &[], asset, asset)
            .await?;

        // pool-derived listings report "X-LP"; show the pool's first leg instead
        let symbol = if response.symbol.ends_with(LP_SYMBOL_SUFFIX) {
            response
                .name
                .split('-')
                .next()
                .unwrap_or(&response.name)
                .trim()
                .to_string()
        } else {
            response.symbol
        };

        Ok(TokenInfo {
            asset_id: AssetId::new(response.asset_id),
            symbol,
            name: response.name,
            decimals: response.decimals,
            class: TradabilityClass::Pooled,
        })
    }
}

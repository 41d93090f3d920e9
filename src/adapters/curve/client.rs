//! Curve-venue HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::adapters::chain::UserWallet;
use crate::domain::{to_readable, AssetId, TokenInfo, TradabilityClass};
use crate::ports::venue::{ExecutionReceipt, Venue, VenueError, VenueKind};

use super::types::{
    coin_status, error_codes, CurveCoinResponse, CurveErrorResponse, CurvePreviewResponse,
    CurveTradeRequest, CurveTradeResponse,
};

/// Every asset the curve venue lists uses the chain-native decimal count.
const CURVE_DECIMALS: u8 = 9;

/// Trade direction relative to the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Buy,
    Sell,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Curve venue configuration.
#[derive(Debug, Clone)]
pub struct CurveVenueConfig {
    pub name: String,
    pub api_url: String,
    /// The asset every curve pair trades against.
    pub trade_asset: AssetId,
    pub timeout: Duration,
}

/// HTTP client for a bonding-curve liquidity venue.
pub struct CurveVenue {
    config: CurveVenueConfig,
    http: Client,
}

impl CurveVenue {
    pub fn new(config: CurveVenueConfig) -> Result<Self, VenueError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VenueError::Protocol(format!("failed to build http client: {e}")))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// Which coin is traded and in which direction, or `RouteUnavailable`
    /// when neither side is the trade asset.
    fn classify_pair<'a>(
        &self,
        asset_in: &'a AssetId,
        asset_out: &'a AssetId,
    ) -> Result<(Side, &'a AssetId), VenueError> {
        let trade = &self.config.trade_asset;
        if asset_in == trade && asset_out != trade {
            Ok((Side::Buy, asset_out))
        } else if asset_out == trade && asset_in != trade {
            Ok((Side::Sell, asset_in))
        } else {
            Err(VenueError::RouteUnavailable(
                asset_in.clone(),
                asset_out.clone(),
            ))
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
        subject: &AssetId,
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
        match serde_json::from_str::<CurveErrorResponse>(&body) {
            Ok(err) => match err.error.as_str() {
                error_codes::COIN_NOT_FOUND => Err(VenueError::AssetNotFound(subject.clone())),
                error_codes::SLIPPAGE_EXCEEDED => Err(VenueError::ExecutionFailed(format!(
                    "slippage floor not met: {}",
                    err.message
                ))),
                other => Err(VenueError::Protocol(format!("{other}: {}", err.message))),
            },
            Err(_) => Err(VenueError::Protocol(format!("status {status}: {body}"))),
        }
    }

    async fn preview(&self, side: Side, coin: &AssetId, amount_in: u64) -> Result<u64, VenueError> {
        let path = match side {
            Side::Buy => "preview/buy",
            Side::Sell => "preview/sell",
        };
        let response = self
            .http
            .get(self.url(path))
            .query(&[
                ("asset", coin.to_string()),
                ("amount_in", amount_in.to_string()),
            ])
            .send()
            .await
            .map_err(|e| VenueError::Network(e.to_string()))?;

        let preview: CurvePreviewResponse = Self::handle_response(response, coin).await?;
        match preview.output_amount() {
            Some(out) if out > 0 => Ok(out),
            Some(_) => Err(VenueError::Protocol("curve previewed zero output".into())),
            None => Err(VenueError::Protocol(format!(
                "unparseable preview amount: {}",
                preview.amount_out
            ))),
        }
    }
}

#[async_trait]
impl Venue for CurveVenue {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> VenueKind {
        VenueKind::BondingCurve
    }

    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<u64, VenueError> {
        let (side, coin) = self.classify_pair(asset_in, asset_out)?;
        self.preview(side, coin, amount_in).await
    }

    async fn rate(&self, asset_in: &AssetId, asset_out: &AssetId) -> Result<Decimal, VenueError> {
        let (side, coin) = self.classify_pair(asset_in, asset_out)?;
        let unit = 10u64.pow(CURVE_DECIMALS as u32);
        let out = self.preview(side, coin, unit).await?;
        Ok(to_readable(out, CURVE_DECIMALS))
    }

    async fn execute(
        &self,
        wallet: &UserWallet,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<ExecutionReceipt, VenueError> {
        let (side, coin) = self.classify_pair(asset_in, asset_out)?;

        let order = format!("{}:{coin}:{amount_in}:{min_amount_out}", side.as_str());
        let body = CurveTradeRequest {
            side: side.as_str().to_string(),
            asset: coin.to_string(),
            amount_in: amount_in.to_string(),
            min_amount_out: min_amount_out.to_string(),
            wallet: wallet.address(),
            signature: wallet.sign_message(order.as_bytes()).to_string(),
        };

        let response = self
            .http
            .post(self.url("trade"))
            .json(&body)
            .send()
            .await
            .map_err(|e| VenueError::Network(e.to_string()))?;
        let submitted: CurveTradeResponse = Self::handle_response(response, coin).await?;

        let amount_out = submitted.amount_out.parse().map_err(|_| {
            VenueError::Protocol(format!("unparseable settled amount: {}", submitted.amount_out))
        })?;
        Ok(ExecutionReceipt {
            tx_id: submitted.tx_id,
            amount_out,
        })
    }

    async fn token_info(&self, asset: &AssetId) -> Result<TokenInfo, VenueError> {
        let response = self
            .http
            .get(self.url(&format!("coins/{asset}")))
            .send()
            .await
            .map_err(|e| VenueError::Network(e.to_string()))?;
        let coin: CurveCoinResponse = Self::handle_response(response, asset).await?;

        let class = match coin.status.as_str() {
            coin_status::ON_CURVE => TradabilityClass::BondingCurve,
            coin_status::MIGRATED => TradabilityClass::Pooled,
            // delisted or not yet launched; the venue cannot vouch for it
            _ => return Err(VenueError::AssetNotFound(asset.clone())),
        };

        Ok(TokenInfo {
            asset_id: AssetId::new(coin.asset_id),
            symbol: coin.symbol,
            name: coin.name,
            decimals: coin.decimals,
            class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue() -> CurveVenue {
        CurveVenue::new(CurveVenueConfig {
            name: "launchpad".into(),
            api_url: "http://localhost:9100".into(),
            trade_asset: AssetId::new("NATIVE"),
            timeout: Duration::from_secs(10),
        })
        .unwrap()
    }

    #[test]
    fn test_pair_classification() {
        let v = venue();
        let native = AssetId::new("NATIVE");
        let coin = AssetId::new("COIN");

        let (side, asset) = v.classify_pair(&native, &coin).unwrap();
        assert_eq!(side, Side::Buy);
        assert_eq!(asset, &coin);

        let (side, asset) = v.classify_pair(&coin, &native).unwrap();
        assert_eq!(side, Side::Sell);
        assert_eq!(asset, &coin);
    }

    #[test]
    fn test_pair_without_trade_asset_unroutable() {
        let v = venue();
        let coin_a = AssetId::new("COIN_A");
        let coin_b = AssetId::new("COIN_B");
        let result = v.classify_pair(&coin_a, &coin_b);
        assert!(matches!(result, Err(VenueError::RouteUnavailable(_, _))));

        let native = AssetId::new("NATIVE");
        assert!(v.classify_pair(&native, &native).is_err());
    }
}

//! Curve-venue wire types

use serde::{Deserialize, Serialize};

/// Launch status of a coin on the curve venue.
pub mod coin_status {
    /// Still priced by the issuance curve.
    pub const ON_CURVE: &str = "curve";
    /// Graduated to pooled liquidity; the curve no longer trades it.
    pub const MIGRATED: &str = "migrated";
}

/// Response from the coin metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveCoinResponse {
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub status: String,
}

/// Response from the buy/sell preview endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePreviewResponse {
    pub amount_out: String,
}

impl CurvePreviewResponse {
    pub fn output_amount(&self) -> Option<u64> {
        self.amount_out.parse().ok()
    }
}

/// Trade submission payload.
#[derive(Debug, Clone, Serialize)]
pub struct CurveTradeRequest {
    /// `"buy"` or `"sell"`.
    pub side: String,
    pub asset: String,
    pub amount_in: String,
    pub min_amount_out: String,
    pub wallet: String,
    pub signature: String,
}

/// Trade submission response.
#[derive(Debug, Clone, Deserialize)]
pub struct CurveTradeResponse {
    pub tx_id: String,
    pub amount_out: String,
}

/// Error body returned by the venue on non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct CurveErrorResponse {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Machine-readable error codes the venue emits.
pub mod error_codes {
    pub const COIN_NOT_FOUND: &str = "coin_not_found";
    pub const SLIPPAGE_EXCEEDED: &str = "slippage_exceeded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_response_parsing() {
        let json = r#"{
            "asset_id": "CurveCoin1111111111111111111111111111111111",
            "name": "Curve Coin",
            "symbol": "CRV1",
            "decimals": 9,
            "status": "curve"
        }"#;
        let coin: CurveCoinResponse = serde_json::from_str(json).unwrap();
        assert_eq!(coin.symbol, "CRV1");
        assert_eq!(coin.status, coin_status::ON_CURVE);
    }

    #[test]
    fn test_preview_parsing() {
        let preview: CurvePreviewResponse =
            serde_json::from_str(r#"{"amount_out": "5000000000"}"#).unwrap();
        assert_eq!(preview.output_amount(), Some(5_000_000_000));
    }
}

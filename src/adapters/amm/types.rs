//! Pooled-venue wire types
//!
//! Amounts travel as strings to avoid precision loss in transit.

use serde::{Deserialize, Serialize};

/// Response from the quote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolQuoteResponse {
    /// Projected output in base units.
    pub amount_out: String,
}

impl PoolQuoteResponse {
    pub fn output_amount(&self) -> Option<u64> {
        self.amount_out.parse().ok()
    }
}

/// Response from the rate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRateResponse {
    /// Output per one canonical input unit, as a decimal string.
    pub rate: String,
}

/// Response from the asset metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolAssetResponse {
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Swap submission payload.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSwapRequest {
    pub asset_in: String,
    pub asset_out: String,
    pub amount_in: String,
    pub min_amount_out: String,
    /// Hop asset for two-leg routes, when the direct pool is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    pub wallet: String,
    /// Signature over the canonical order payload.
    pub signature: String,
}

/// Swap submission response.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSwapResponse {
    pub tx_id: String,
    pub amount_out: String,
}

/// Error body returned by the venue on non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolErrorResponse {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Machine-readable error codes the venue emits.
pub mod error_codes {
    pub const POOL_NOT_FOUND: &str = "pool_not_found";
    pub const ASSET_NOT_FOUND: &str = "asset_not_found";
    pub const SLIPPAGE_EXCEEDED: &str = "slippage_exceeded";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_response_parsing() {
        let json = r#"{"amount_out": "62000000"}"#;
        let quote: PoolQuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(quote.output_amount(), Some(62_000_000));
    }

    #[test]
    fn test_quote_response_bad_amount() {
        let quote = PoolQuoteResponse {
            amount_out: "not-a-number".into(),
        };
        assert_eq!(quote.output_amount(), None);
    }

    #[test]
    fn test_error_response_parsing() {
        let json = r#"{"error": "pool_not_found", "message": "no direct pool"}"#;
        let err: PoolErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(err.error, error_codes::POOL_NOT_FOUND);
        assert_eq!(err.message, "no direct pool");
    }

    #[test]
    fn test_swap_request_omits_empty_via() {
        let request = PoolSwapRequest {
            asset_in: "A".into(),
            asset_out: "B".into(),
            amount_in: "100".into(),
            min_amount_out: "95".into(),
            via: None,
            wallet: "W".into(),
            signature: "S".into(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("via"));
    }
}

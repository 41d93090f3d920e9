//! Routing request input
//!
//! Ephemeral value collected from a user per routed swap; never persisted.
//! The per-venue quote produced while routing surfaces as
//! `application::router::RoutedQuote`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::token::AssetId;

/// Input to a routed swap, as collected from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    /// Human-readable input amount (converted per the input asset's decimals).
    pub amount_in: Decimal,
    /// Slippage tolerance in basis points, `[0, 10000)`.
    pub slippage_bps: u16,
}

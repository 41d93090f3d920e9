//! Asset identity and metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque on-chain asset identifier (mint address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which venue set may route an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradabilityClass {
    /// Externally verified registry entry; always tradable on pooled venues.
    Registry,
    /// Confirmed by a pooled venue (migrated or pool-listed).
    Pooled,
    /// Still priced by an issuance curve; tradable only on curve venues.
    BondingCurve,
}

impl TradabilityClass {
    /// Registry and pool-listed assets route through the pooled venue set.
    pub fn is_pooled_tradable(self) -> bool {
        matches!(self, TradabilityClass::Registry | TradabilityClass::Pooled)
    }
}

/// Resolved asset metadata. Immutable once resolved; cached by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub asset_id: AssetId,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub class: TradabilityClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tradability_partition() {
        assert!(TradabilityClass::Registry.is_pooled_tradable());
        assert!(TradabilityClass::Pooled.is_pooled_tradable());
        assert!(!TradabilityClass::BondingCurve.is_pooled_tradable());
    }

    #[test]
    fn test_asset_id_display_roundtrip() {
        let id = AssetId::new("So11111111111111111111111111111111111111112");
        assert_eq!(id.to_string(), id.as_str());
    }
}

//! Verified-asset feed boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AssetId;

/// One externally verified asset listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedAsset {
    pub asset_id: AssetId,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry fetch failed: {0}")]
    Network(String),

    #[error("registry payload malformed: {0}")]
    Malformed(String),
}

/// Source of the periodically refreshed verified-asset list.
#[async_trait]
pub trait AssetRegistrySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<VerifiedAsset>, RegistryError>;
}

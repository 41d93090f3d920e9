//! Verified-asset feed HTTP client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::ports::registry::{AssetRegistrySource, RegistryError, VerifiedAsset};

/// Fetches the verified-asset list from a JSON feed.
pub struct HttpRegistrySource {
    url: String,
    http: Client,
}

impl HttpRegistrySource {
    pub fn new(url: String, timeout: Duration) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl AssetRegistrySource for HttpRegistrySource {
    async fn fetch(&self) -> Result<Vec<VerifiedAsset>, RegistryError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RegistryError::Network(format!(
                "feed returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RegistryError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetId;

    #[test]
    fn test_feed_payload_shape() {
        let json = r#"[
            {"asset_id": "So11111111111111111111111111111111111111112",
             "symbol": "SOL", "name": "Solana", "decimals": 9},
            {"asset_id": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
             "symbol": "USDC", "name": "USD Coin", "decimals": 6}
        ]"#;
        let assets: Vec<VerifiedAsset> = serde_json::from_str(json).unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].symbol, "SOL");
        assert_eq!(
            assets[1].asset_id,
            AssetId::new("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")
        );
    }
}

//! In-memory registry cache with background refresh

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::AssetId;
use crate::ports::registry::{AssetRegistrySource, VerifiedAsset};

/// Shared snapshot of the verified-asset feed. A failed refresh keeps the
/// previous snapshot so a feed outage never degrades resolution.
#[derive(Default)]
pub struct RegistryCache {
    assets: RwLock<HashMap<AssetId, VerifiedAsset>>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &AssetId) -> Option<VerifiedAsset> {
        self.assets.read().unwrap().get(asset).cloned()
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.assets.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.assets.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().unwrap().is_empty()
    }

    /// Replace the snapshot from the feed; keeps the old one on failure.
    pub async fn refresh(&self, source: &dyn AssetRegistrySource) {
        match source.fetch().await {
            Ok(assets) => {
                let mut map = self.assets.write().unwrap();
                map.clear();
                for asset in assets {
                    map.insert(asset.asset_id.clone(), asset);
                }
                tracing::debug!(count = map.len(), "verified-asset registry refreshed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "registry refresh failed, keeping previous snapshot");
            }
        }
    }

    /// Keep refreshing on the interval until every other handle to the
    /// cache is dropped.
    pub fn spawn_refresher(
        self: Arc<Self>,
        source: Arc<dyn AssetRegistrySource>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let cache = Arc::downgrade(&self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => cache.refresh(source.as_ref()).await,
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::MockRegistrySource;

    fn asset(id: &str, symbol: &str) -> VerifiedAsset {
        VerifiedAsset {
            asset_id: AssetId::new(id),
            symbol: symbol.into(),
            name: symbol.into(),
            decimals: 9,
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let cache = RegistryCache::new();
        let source = MockRegistrySource::new(vec![asset("AAA", "A"), asset("BBB", "B")]);

        cache.refresh(&source).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&AssetId::new("AAA")).unwrap().symbol, "A");

        source.set_assets(vec![asset("CCC", "C")]);
        cache.refresh(&source).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&AssetId::new("AAA")).is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous() {
        let cache = RegistryCache::new();
        let source = MockRegistrySource::new(vec![asset("AAA", "A")]);

        cache.refresh(&source).await;
        source.set_failing(true);
        cache.refresh(&source).await;

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&AssetId::new("AAA")).is_some());
    }
}

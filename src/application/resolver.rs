//! Token metadata resolution
//!
//! Resolution order: verified registry, positive cache, negative cache, then
//! venue probes in registration order. Positive results cache indefinitely;
//! ids every venue definitively rejects cache a not-found sentinel so the
//! same unsupported id never triggers a second probe round. Cache writes are
//! idempotent (all writers compute the same value for a key), so they race
//! safely under plain last-write-wins.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::adapters::registry::RegistryCache;
use crate::domain::{AssetId, TokenInfo, TradabilityClass};
use crate::ports::venue::{Venue, VenueError};

use super::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("token info not found for asset {0}")]
    NotFound(AssetId),

    /// A venue failed for a reason other than "unknown asset"; the id stays
    /// out of the negative cache so a later resolve can try again.
    #[error(transparent)]
    Venue(VenueError),
}

pub struct TokenInfoResolver {
    registry: Arc<RegistryCache>,
    venues: Vec<Arc<dyn Venue>>,
    retry: RetryPolicy,
    positive: RwLock<HashMap<AssetId, TokenInfo>>,
    negative: RwLock<HashSet<AssetId>>,
}

impl TokenInfoResolver {
    pub fn new(
        registry: Arc<RegistryCache>,
        venues: Vec<Arc<dyn Venue>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            venues,
            retry,
            positive: RwLock::new(HashMap::new()),
            negative: RwLock::new(HashSet::new()),
        }
    }

    pub async fn resolve(&self, asset: &AssetId) -> Result<TokenInfo, ResolveError> {
        // registry entries are pre-verified; no venue confirmation needed
        if let Some(verified) = self.registry.get(asset) {
            return Ok(TokenInfo {
                asset_id: verified.asset_id,
                symbol: verified.symbol,
                name: verified.name,
                decimals: verified.decimals,
                class: TradabilityClass::Registry,
            });
        }

        if let Some(cached) = self.positive.read().unwrap().get(asset) {
            return Ok(cached.clone());
        }

        if self.negative.read().unwrap().contains(asset) {
            return Err(ResolveError::NotFound(asset.clone()));
        }

        let mut inconclusive: Option<VenueError> = None;
        for venue in &self.venues {
            match self.retry.run_network(|| venue.token_info(asset)).await {
                Ok(info) => {
                    self.positive
                        .write()
                        .unwrap()
                        .insert(asset.clone(), info.clone());
                    return Ok(info);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(venue = venue.name(), %asset, "venue does not know asset");
                }
                Err(e) => {
                    tracing::info!(venue = venue.name(), %asset, error = %e, "probe failed");
                    inconclusive = Some(e);
                }
            }
        }

        match inconclusive {
            // at least one venue could not answer; the id is not proven
            // unsupported, so do not poison the negative cache
            Some(e) => Err(ResolveError::Venue(e)),
            None => {
                self.negative.write().unwrap().insert(asset.clone());
                Err(ResolveError::NotFound(asset.clone()))
            }
        }
    }

    /// Assets worth checking for holdings: everything in the registry plus
    /// everything positively resolved so far.
    pub fn known_assets(&self) -> Vec<AssetId> {
        let mut assets = self.registry.asset_ids();
        let seen: HashSet<AssetId> = assets.iter().cloned().collect();
        for asset in self.positive.read().unwrap().keys() {
            if !seen.contains(asset) {
                assets.push(asset.clone());
            }
        }
        assets
    }
}

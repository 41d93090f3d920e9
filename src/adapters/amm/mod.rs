//! Pooled-AMM venue adapter
//!
//! HTTP client for a pool-based liquidity venue. Not every asset pair has a
//! direct pool, so quotes and executions fall back to a two-leg route through
//! the venue's high-liquidity base asset, then through the stable asset,
//! before reporting the pair unroutable.

pub mod client;
pub mod types;

pub use client::{AmmVenue, AmmVenueConfig};

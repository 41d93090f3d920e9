//! Bonding-curve venue adapter
//!
//! HTTP client for a launchpad-style venue that prices trades on a
//! deterministic issuance curve. Every pair must include the venue's trade
//! asset: you buy a curve token with it, or sell a curve token back into it.

pub mod client;
pub mod types;

pub use client::{CurveVenue, CurveVenueConfig};

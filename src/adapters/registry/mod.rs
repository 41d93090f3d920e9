//! Verified-asset feed
//!
//! Periodically refreshed read-only list of externally verified assets. The
//! resolver treats it as a read-through cache: registry entries are always
//! pooled-tradable and never need venue confirmation.

pub mod cache;
pub mod client;

pub use cache::RegistryCache;
pub use client::HttpRegistrySource;

//! Swapdeck - Multi-Venue Token Swap Bot Core
//!
//! Executes token swaps through whichever registered venue currently offers
//! the best price, keeps one wallet-backed session per user, and drives
//! multi-step cancelable confirmation dialogs for buy/sell/withdraw.
//!
//! # Modules
//!
//! - `domain`: Asset identity, amount conversion, slippage floor math
//! - `ports`: Trait seams (Venue, ChatPort, WalletStore, chain access,
//!   registry feed, telemetry) plus recording mocks
//! - `adapters`: Pooled-AMM and bonding-curve venue clients, registry cache,
//!   wallet/cipher/RPC plumbing, JSON store, console transport
//! - `application`: Retry policy, token resolver, swap router, session store
//! - `flow`: Conversational flow engine and the buy/sell/withdraw variants
//! - `config`: TOML configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod flow;
pub mod ports;

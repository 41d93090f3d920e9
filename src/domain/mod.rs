//! Core business types and arithmetic
//!
//! Chain- and venue-agnostic building blocks: asset identity and metadata,
//! base-unit/readable amount conversion, and the slippage floor math used by
//! the router before any transaction is submitted.

pub mod amount;
pub mod quote;
pub mod slippage;
pub mod token;

pub use amount::{to_base_units, to_readable, AmountError};
pub use quote::SwapRequest;
pub use slippage::{min_output_floor, validate_bps, SlippageError, BPS_SCALE};
pub use token::{AssetId, TokenInfo, TradabilityClass};

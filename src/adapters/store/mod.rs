//! Durable wallet store adapters

pub mod json;

pub use json::JsonWalletStore;

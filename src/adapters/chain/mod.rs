//! Chain-side plumbing
//!
//! Wallet key management (generation, encryption at rest, signing), and the
//! RPC client backing balance reads and direct transfers.

pub mod cipher;
pub mod rpc;
pub mod wallet;

pub use cipher::{CipherError, KeyCipher};
pub use rpc::RpcChainClient;
pub use wallet::{UserWallet, WalletError};

//! Trait seams between the core and its collaborators
//!
//! Every external dependency the engine touches (trading venues, the chat
//! transport, the durable wallet store, chain balance/transfer plumbing, the
//! verified-asset feed, telemetry) is reached through a trait defined here.
//! Concrete implementations live under `adapters`; recording mocks for all of
//! them live in [`mocks`].

pub mod chain;
pub mod chat;
pub mod mocks;
pub mod registry;
pub mod store;
pub mod telemetry;
pub mod venue;

pub use chain::{BalanceReader, ChainError, TransferPort};
pub use chat::{Button, ChatError, ChatPort, MessageId, UserId};
pub use registry::{AssetRegistrySource, RegistryError, VerifiedAsset};
pub use store::{Preferences, StoreError, WalletRecord, WalletStore};
pub use telemetry::{LogSink, NullSink, TelemetrySink};
pub use venue::{ExecutionReceipt, Venue, VenueError, VenueKind};

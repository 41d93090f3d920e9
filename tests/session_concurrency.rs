//! Session lifecycle under concurrent first contacts and idle eviction.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use swapdeck::adapters::chain::KeyCipher;
use swapdeck::adapters::registry::RegistryCache;
use swapdeck::application::{RetryPolicy, SessionServices, SessionStore, TokenInfoResolver};
use swapdeck::domain::AssetId;
use swapdeck::ports::mocks::{MemoryWalletStore, MockChain, MockChat, MockVenue, RecordingSink};
use swapdeck::ports::store::WalletStore;
use swapdeck::ports::venue::Venue;

fn services(store: Arc<MemoryWalletStore>) -> SessionServices {
    let retry = RetryPolicy::new(2, Duration::from_millis(1));
    let venues: Vec<Arc<dyn Venue>> = vec![Arc::new(MockVenue::pooled("amm"))];
    let resolver = Arc::new(TokenInfoResolver::new(
        Arc::new(RegistryCache::new()),
        venues.clone(),
        retry,
    ));
    let chain = Arc::new(MockChain::new());
    SessionServices {
        store,
        chat: Arc::new(MockChat::new()),
        telemetry: Arc::new(RecordingSink::new()),
        resolver,
        venues,
        chain: chain.clone(),
        transfer: chain,
        cipher: KeyCipher::from_key([11u8; 32]),
        trade_asset: AssetId::new("TRADE111111111111111111111111111111111111111"),
        stable_asset: AssetId::new("STABLE11111111111111111111111111111111111111"),
        service_fee_bps: 0,
        dust_threshold: dec!(0.000001),
        retry,
    }
}

/// N simultaneous first contacts for the same new user create exactly one
/// persisted wallet record and one live session.
#[tokio::test]
async fn concurrent_first_contacts_create_one_wallet() {
    let store = Arc::new(MemoryWalletStore::new().with_read_delay(Duration::from_millis(5)));
    let sessions = Arc::new(SessionStore::new(
        services(store.clone()),
        Duration::from_secs(3600),
    ));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let sessions = Arc::clone(&sessions);
            tokio::spawn(async move {
                let session = sessions.get_or_create(1001).await.unwrap();
                session.wallet().address()
            })
        })
        .collect();

    let mut addresses = Vec::new();
    for task in tasks {
        addresses.push(task.await.unwrap());
    }

    assert_eq!(store.record_count().await, 1);
    assert_eq!(store.save_count(), 1);
    assert_eq!(sessions.len(), 1);
    // every caller sees the same wallet
    let persisted = store.wallet_by_user(1001).await.unwrap().unwrap().address;
    assert!(addresses.iter().all(|a| *a == persisted));
}

/// Different users never serialize behind each other's creation: both get
/// their own wallet.
#[tokio::test]
async fn distinct_users_get_distinct_wallets() {
    let store = Arc::new(MemoryWalletStore::new());
    let sessions = SessionStore::new(services(store.clone()), Duration::from_secs(3600));

    let a = sessions.get_or_create(1).await.unwrap();
    let b = sessions.get_or_create(2).await.unwrap();

    assert_ne!(a.wallet().address(), b.wallet().address());
    assert_eq!(store.record_count().await, 2);
    assert_eq!(sessions.len(), 2);
}

/// An idle session is gone after the sweep; a freshly touched one survives.
/// Eviction drops only the in-memory session, never the wallet record.
#[tokio::test]
async fn sweep_evicts_idle_sessions_only() {
    let store = Arc::new(MemoryWalletStore::new());
    let sessions = SessionStore::new(services(store.clone()), Duration::from_millis(30));

    let idle_address = sessions.get_or_create(1).await.unwrap().wallet().address();
    sessions.get_or_create(2).await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;
    // touch user 2 right before the sweep
    sessions.get_or_create(2).await.unwrap();

    assert_eq!(sessions.sweep(), 1);
    assert_eq!(sessions.len(), 1);
    assert_eq!(store.record_count().await, 2);

    // the evicted user comes back with the same persisted wallet
    let revived = sessions.get_or_create(1).await.unwrap();
    assert_eq!(revived.wallet().address(), idle_address);
    assert_eq!(store.save_count(), 2);
}

/// The background sweeper evicts without explicit sweep calls.
#[tokio::test]
async fn background_sweeper_runs_on_interval() {
    let store = Arc::new(MemoryWalletStore::new());
    let sessions = Arc::new(SessionStore::new(
        services(store),
        Duration::from_millis(20),
    ));
    let sweeper = sessions.clone().spawn_sweeper(Duration::from_millis(25));

    sessions.get_or_create(1).await.unwrap();
    assert_eq!(sessions.len(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(sessions.is_empty());

    sweeper.abort();
}

//! Conversational flows driven end to end over mocks: state transitions,
//! cancel idempotence, cleanup-once, supersede semantics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use swapdeck::adapters::chain::{KeyCipher, UserWallet};
use swapdeck::adapters::registry::RegistryCache;
use swapdeck::application::{
    RetryPolicy, SessionServices, SessionStore, SwapRouter, TokenInfoResolver,
};
use swapdeck::domain::AssetId;
use swapdeck::flow::{
    Action, BuyFlow, FlowDriver, MessageTracker, SellFlow, TemplateAction, WithdrawFlow,
};
use swapdeck::ports::chain::{BalanceReader, TransferPort};
use swapdeck::ports::mocks::{
    MemoryWalletStore, MockChain, MockChat, MockRegistrySource, MockVenue, RecordingSink,
};
use swapdeck::ports::registry::VerifiedAsset;
use swapdeck::ports::venue::Venue;

const USER: u64 = 77;

fn trade_asset() -> AssetId {
    AssetId::new("TRADE111111111111111111111111111111111111111")
}

fn stable_asset() -> AssetId {
    AssetId::new("STABLE11111111111111111111111111111111111111")
}

fn meme_asset() -> AssetId {
    AssetId::new("MEME1111111111111111111111111111111111111111")
}

struct Fixture {
    chat: Arc<MockChat>,
    chain: Arc<MockChain>,
    venues: Vec<Arc<MockVenue>>,
    store: Arc<MemoryWalletStore>,
    router: Arc<SwapRouter>,
    resolver: Arc<TokenInfoResolver>,
    retry: RetryPolicy,
}

async fn fixture(venues: Vec<MockVenue>, chain: MockChain) -> Fixture {
    let retry = RetryPolicy::new(2, Duration::from_millis(1));
    let venues: Vec<Arc<MockVenue>> = venues.into_iter().map(Arc::new).collect();
    let dyn_venues: Vec<Arc<dyn Venue>> =
        venues.iter().map(|v| v.clone() as Arc<dyn Venue>).collect();

    let registry = Arc::new(RegistryCache::new());
    registry
        .refresh(&MockRegistrySource::new(vec![
            VerifiedAsset {
                asset_id: trade_asset(),
                symbol: "TRD".into(),
                name: "Trade Asset".into(),
                decimals: 9,
            },
            VerifiedAsset {
                asset_id: stable_asset(),
                symbol: "STB".into(),
                name: "Stable Asset".into(),
                decimals: 6,
            },
            VerifiedAsset {
                asset_id: meme_asset(),
                symbol: "MEME".into(),
                name: "Meme Token".into(),
                decimals: 6,
            },
        ]))
        .await;

    let resolver = Arc::new(TokenInfoResolver::new(registry, dyn_venues.clone(), retry));
    let chain = Arc::new(chain);
    let router = Arc::new(SwapRouter::new(
        dyn_venues,
        resolver.clone(),
        chain.clone() as Arc<dyn BalanceReader>,
        Arc::new(UserWallet::generate()),
        trade_asset(),
        0,
        dec!(0.000001),
        retry,
    ));

    Fixture {
        chat: Arc::new(MockChat::new()),
        chain,
        venues,
        store: Arc::new(MemoryWalletStore::new()),
        router,
        resolver,
        retry,
    }
}

impl Fixture {
    fn tracker(&self) -> MessageTracker {
        MessageTracker::new(self.chat.clone(), USER, self.retry)
    }

    fn sell_flow(&self) -> SellFlow {
        SellFlow::new(
            self.tracker(),
            self.router.clone(),
            self.store.clone(),
            stable_asset(),
            None,
            None,
        )
    }

    fn buy_flow(&self, preset: Option<AssetId>) -> BuyFlow {
        BuyFlow::new(
            self.tracker(),
            self.router.clone(),
            self.store.clone(),
            stable_asset(),
            preset,
        )
    }

    fn withdraw_flow(&self) -> WithdrawFlow {
        WithdrawFlow::new(
            self.tracker(),
            self.router.clone(),
            self.chain.clone() as Arc<dyn TransferPort>,
            Arc::new(UserWallet::generate()),
            self.retry,
        )
    }
}

fn counting_callback() -> (Arc<AtomicU32>, Arc<AtomicU32>, swapdeck::flow::CompletionCallback) {
    let completions = Arc::new(AtomicU32::new(0));
    let successes = Arc::new(AtomicU32::new(0));
    let completions_inner = completions.clone();
    let successes_inner = successes.clone();
    let callback: swapdeck::flow::CompletionCallback = Box::new(move |_id, successful| {
        completions_inner.fetch_add(1, Ordering::SeqCst);
        if successful {
            successes_inner.fetch_add(1, Ordering::SeqCst);
        }
    });
    (completions, successes, callback)
}

/// Full sell: select the asset, pick 100%, confirm. The router executes and
/// the flow finishes successful; tracked prompts are deleted.
#[tokio::test]
async fn sell_flow_completes_and_cleans_up() {
    let fx = fixture(
        vec![
            MockVenue::pooled("venue-a").with_quote(&meme_asset(), &trade_asset(), 50_000_000_000),
            MockVenue::pooled("venue-b")
                .with_quote(&meme_asset(), &trade_asset(), 62_000_000_000)
                .with_execution("tx-sell", 61_400_000_000),
        ],
        MockChain::new()
            .with_balance(&meme_asset(), 100_000_000) // 100 MEME
            .with_balance(&trade_asset(), 0),
    )
    .await;

    let (completions, successes, callback) = counting_callback();
    let mut driver = FlowDriver::new(Box::new(fx.sell_flow()), Some(callback));

    driver.start().await;
    assert!(!driver.is_finished());

    assert!(driver
        .dispatch_template_action(&TemplateAction::Sell("MEME".into()))
        .await);
    assert!(driver.dispatch_action(&Action::Percent(100)).await);
    assert!(!driver.is_finished());

    assert!(driver.dispatch_action(&Action::Accept).await);
    assert!(driver.is_finished());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    // the winning venue got the full balance with the 100 bps default floor
    let calls = fx.venues[1].execute_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount_in, 100_000_000);
    assert_eq!(calls[0].min_amount_out, 61_380_000_000);

    // every tracked prompt was deleted; the success notification survives
    let sent_ids: Vec<i64> = fx.chat.sent().iter().map(|m| m.id).collect();
    let deleted = fx.chat.deleted();
    assert_eq!(deleted.len(), sent_ids.len() - 1);
    let texts = fx.chat.sent_texts();
    assert!(texts.last().unwrap().contains("Sold"));
}

/// Cancel in the confirmation state finishes the flow unsuccessfully with no
/// execution; a second cancel is a no-op and cleanup runs exactly once.
#[tokio::test]
async fn sell_flow_cancel_is_idempotent() {
    let fx = fixture(
        vec![MockVenue::pooled("venue")
            .with_quote(&meme_asset(), &trade_asset(), 62_000_000_000)
            .with_execution("tx-never", 1)],
        MockChain::new().with_balance(&meme_asset(), 100_000_000),
    )
    .await;

    let (completions, successes, callback) = counting_callback();
    let mut driver = FlowDriver::new(Box::new(fx.sell_flow()), Some(callback));

    driver.start().await;
    driver
        .dispatch_template_action(&TemplateAction::Sell("MEME".into()))
        .await;
    driver.dispatch_action(&Action::Percent(50)).await;

    assert!(driver.dispatch_action(&Action::Cancel).await);
    assert!(driver.is_finished());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 0);
    let deleted_after_first_cancel = fx.chat.deleted().len();

    // second cancel: no dispatch, no second cleanup, no second callback
    assert!(!driver.dispatch_action(&Action::Cancel).await);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(fx.chat.deleted().len(), deleted_after_first_cancel);

    // nothing was executed
    assert!(fx.venues[0].execute_calls().is_empty());
}

/// Invalid percentage input re-prompts without leaving the percentage state.
#[tokio::test]
async fn sell_flow_invalid_percentage_reprompts() {
    let fx = fixture(
        vec![MockVenue::pooled("venue")
            .with_quote(&meme_asset(), &trade_asset(), 62_000_000_000)
            .with_execution("tx", 61_000_000_000)],
        MockChain::new()
            .with_balance(&meme_asset(), 100_000_000)
            .with_balance(&trade_asset(), 0),
    )
    .await;

    let mut driver = FlowDriver::new(Box::new(fx.sell_flow()), None);
    driver.start().await;
    driver
        .dispatch_template_action(&TemplateAction::Sell("MEME".into()))
        .await;

    // out-of-range and non-numeric inputs are rejected in place
    assert!(!driver.dispatch_message("250").await);
    assert!(!driver.dispatch_message("all of it").await);
    assert!(!driver.is_finished());

    // the state machine still accepts a valid percentage afterwards
    assert!(driver.dispatch_message("50").await);
    assert!(driver.dispatch_action(&Action::Accept).await);
    assert!(driver.is_finished());
    assert_eq!(fx.venues[0].execute_calls()[0].amount_in, 50_000_000);
}

/// Message deletion faults during cleanup are retried and then swallowed;
/// the flow still completes.
#[tokio::test]
async fn cleanup_survives_delete_faults() {
    let fx = fixture(
        vec![MockVenue::pooled("venue").with_quote(&meme_asset(), &trade_asset(), 1_000_000_000)],
        MockChain::new().with_balance(&meme_asset(), 100_000_000),
    )
    .await;

    let mut driver = FlowDriver::new(Box::new(fx.sell_flow()), None);
    driver.start().await;
    driver
        .dispatch_template_action(&TemplateAction::Sell("MEME".into()))
        .await;
    driver.dispatch_action(&Action::Percent(50)).await;

    // the first delete attempt fails; the unconditional retry recovers it
    fx.chat.fail_next_deletes(1);
    driver.dispatch_action(&Action::Cancel).await;
    assert!(driver.is_finished());
    assert_eq!(fx.chat.deleted().len(), 3);
}

/// Buy flow: unknown asset and oversized amounts re-prompt; a valid amount
/// reaches confirmation and executes.
#[tokio::test]
async fn buy_flow_validates_and_executes() {
    let fx = fixture(
        vec![MockVenue::pooled("venue")
            .with_quote(&trade_asset(), &meme_asset(), 40_000_000)
            .with_quote(&stable_asset(), &meme_asset(), 20_000_000)
            .with_execution("tx-buy", 39_900_000)],
        MockChain::new()
            .with_balance(&trade_asset(), 5_000_000_000) // 5 TRD spendable
            .with_balance(&meme_asset(), 0),
    )
    .await;

    let (completions, successes, callback) = counting_callback();
    let mut driver = FlowDriver::new(Box::new(fx.buy_flow(None)), Some(callback));
    driver.start().await;

    // unknown asset id re-prompts in INPUT_ASSET
    assert!(driver
        .dispatch_message("BOGUS111111111111111111111111111111111111111")
        .await);
    assert!(!driver.is_finished());

    // known asset advances to the amount step
    assert!(driver.dispatch_message(meme_asset().as_str()).await);

    // amount above the trade balance is rejected in place
    assert!(!driver.dispatch_message("9").await);

    assert!(driver.dispatch_message("1").await);
    assert!(driver.dispatch_action(&Action::Accept).await);
    assert!(driver.is_finished());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    let calls = fx.venues[0].execute_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount_in, 1_000_000_000);
}

/// Withdraw flow: address validation, amount bounds, and the transfer call.
#[tokio::test]
async fn withdraw_flow_transfers_after_confirmation() {
    let fx = fixture(
        vec![MockVenue::pooled("venue")],
        MockChain::new().with_balance(&meme_asset(), 50_000_000), // 50 MEME
    )
    .await;

    let (completions, successes, callback) = counting_callback();
    let mut driver = FlowDriver::new(Box::new(fx.withdraw_flow()), Some(callback));
    driver.start().await;

    assert!(driver
        .dispatch_template_action(&TemplateAction::Withdraw("MEME".into()))
        .await);

    // malformed destination re-prompts
    assert!(driver.dispatch_message("short").await);
    assert!(!driver.is_finished());

    let destination = "DEST1111111111111111111111111111111111111111";
    assert!(driver.dispatch_message(destination).await);

    // amount above balance re-prompts, then a valid amount confirms
    assert!(driver.dispatch_message("80").await);
    assert!(driver.dispatch_message("20").await);
    assert!(driver.dispatch_action(&Action::Accept).await);

    assert!(driver.is_finished());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(successes.load(Ordering::SeqCst), 1);

    let transfers = fx.chain.transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].destination, destination);
    assert_eq!(transfers[0].asset, meme_asset());
    assert_eq!(transfers[0].amount, 20_000_000);
}

/// Starting a new flow supersedes the active one: its prompts are cleaned
/// up and its completion callback never fires.
#[tokio::test]
async fn superseding_flow_cleans_predecessor_without_completion() {
    let fx = fixture(
        vec![MockVenue::pooled("venue").with_quote(&meme_asset(), &trade_asset(), 1_000_000_000)],
        MockChain::new()
            .with_balance(&meme_asset(), 100_000_000)
            .with_balance(&trade_asset(), 5_000_000_000),
    )
    .await;

    let telemetry = Arc::new(RecordingSink::new());
    let services = SessionServices {
        store: fx.store.clone(),
        chat: fx.chat.clone(),
        telemetry: telemetry.clone(),
        resolver: fx.resolver.clone(),
        venues: fx
            .venues
            .iter()
            .map(|v| v.clone() as Arc<dyn Venue>)
            .collect(),
        chain: fx.chain.clone(),
        transfer: fx.chain.clone(),
        cipher: KeyCipher::from_key([5u8; 32]),
        trade_asset: trade_asset(),
        stable_asset: stable_asset(),
        service_fee_bps: 0,
        dust_threshold: dec!(0.000001),
        retry: fx.retry,
    };

    let sessions = SessionStore::new(services, Duration::from_secs(3600));
    let session = sessions.get_or_create(USER).await.unwrap();
    session.accept_terms().await.unwrap();

    // the sell flow parks at asset selection
    session.begin_sell(None, None).await;
    assert!(session.has_active_flow().await);
    let prompts_before = fx.chat.sent().len();
    assert!(prompts_before > 0);
    assert!(fx.chat.deleted().is_empty());

    // the buy flow supersedes it: sell prompts get deleted, but the sell
    // flow never finished, so no completion event fires for it
    session.begin_buy(None).await;
    assert!(session.has_active_flow().await);
    assert!(!fx.chat.deleted().is_empty());
    assert!(!telemetry.event_names().iter().any(|e| e == "flow_completed"));
}

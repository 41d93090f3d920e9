//! Per-user sessions
//!
//! A Session owns one decrypted wallet and a router bound to it, plus the
//! user's single active-flow slot. The store maps external user ids to
//! sessions, creating wallets lazily on first contact. The only contended
//! write path, first-time wallet creation, is double-checked under one
//! process-wide mutex so N simultaneous first messages persist exactly one
//! record; the hit path touches an atomic timestamp under a read lock only.
//! A periodic sweep evicts idle sessions without touching durable records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::adapters::chain::{KeyCipher, UserWallet};
use crate::domain::AssetId;
use crate::flow::{
    Action, BuyFlow, CompletionCallback, Flow, FlowDriver, MessageTracker, SellFlow,
    TemplateAction, WithdrawFlow,
};
use crate::ports::chain::{BalanceReader, TransferPort};
use crate::ports::chat::{ChatPort, UserId};
use crate::ports::store::{Preferences, StoreError, WalletRecord, WalletStore};
use crate::ports::telemetry::TelemetrySink;
use crate::ports::venue::Venue;

use super::resolver::TokenInfoResolver;
use super::retry::RetryPolicy;
use super::router::SwapRouter;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("wallet store failure: {0}")]
    Store(#[from] StoreError),

    /// Wallet generation or decryption failed; fatal for this call only.
    #[error("wallet unusable: {0}")]
    Wallet(String),
}

/// Everything a session needs beyond its own wallet. Shared across all
/// sessions; cheap to clone.
#[derive(Clone)]
pub struct SessionServices {
    pub store: Arc<dyn WalletStore>,
    pub chat: Arc<dyn ChatPort>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub resolver: Arc<TokenInfoResolver>,
    pub venues: Vec<Arc<dyn Venue>>,
    pub chain: Arc<dyn BalanceReader>,
    pub transfer: Arc<dyn TransferPort>,
    pub cipher: KeyCipher,
    pub trade_asset: AssetId,
    pub stable_asset: AssetId,
    pub service_fee_bps: u16,
    pub dust_threshold: Decimal,
    pub retry: RetryPolicy,
}

/// One user's live state: wallet, router, and the active-flow slot.
pub struct Session {
    user_id: UserId,
    wallet: Arc<UserWallet>,
    router: Arc<SwapRouter>,
    services: SessionServices,
    active_flow: tokio::sync::Mutex<Option<FlowDriver>>,
}

impl Session {
    pub fn new(user_id: UserId, wallet: Arc<UserWallet>, services: SessionServices) -> Self {
        let router = Arc::new(SwapRouter::new(
            services.venues.clone(),
            Arc::clone(&services.resolver),
            Arc::clone(&services.chain),
            Arc::clone(&wallet),
            services.trade_asset.clone(),
            services.service_fee_bps,
            services.dust_threshold,
            services.retry,
        ));
        Self {
            user_id,
            wallet,
            router,
            services,
            active_flow: tokio::sync::Mutex::new(None),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn wallet(&self) -> &Arc<UserWallet> {
        &self.wallet
    }

    pub fn router(&self) -> &Arc<SwapRouter> {
        &self.router
    }

    pub async fn preferences(&self) -> Result<Preferences, StoreError> {
        Ok(self
            .services
            .store
            .preferences(self.user_id)
            .await?
            .unwrap_or_default())
    }

    pub async fn accept_terms(&self) -> Result<(), StoreError> {
        let mut preferences = self.preferences().await?;
        preferences.accepted_terms = true;
        self.services
            .store
            .save_preferences(self.user_id, &preferences)
            .await?;
        self.services.telemetry.track("user_terms_accepted", &[]);
        Ok(())
    }

    pub async fn set_slippage(&self, slippage_bps: u16) -> Result<(), StoreError> {
        let mut preferences = self.preferences().await?;
        preferences.slippage_bps = slippage_bps;
        self.services
            .store
            .save_preferences(self.user_id, &preferences)
            .await
    }

    fn new_tracker(&self) -> MessageTracker {
        MessageTracker::new(
            Arc::clone(&self.services.chat),
            self.user_id,
            self.services.retry,
        )
    }

    fn completion_callback(&self) -> CompletionCallback {
        let telemetry = Arc::clone(&self.services.telemetry);
        Box::new(move |id, successful| {
            telemetry.track(
                "flow_completed",
                &[
                    ("flow", id.as_str().to_string()),
                    ("successful", successful.to_string()),
                ],
            );
        })
    }

    /// Start a flow, superseding (and cleaning up) any active one.
    pub async fn start_flow(&self, flow: Box<dyn Flow>) {
        let callback = self.completion_callback();
        let mut slot = self.active_flow.lock().await;
        if let Some(mut previous) = slot.take() {
            previous.abort().await;
        }
        let mut driver = FlowDriver::new(flow, Some(callback));
        driver.start().await;
        if !driver.is_finished() {
            *slot = Some(driver);
        }
    }

    pub async fn begin_buy(&self, preset_asset: Option<AssetId>) {
        self.services
            .telemetry
            .track("user_command", &[("command", "buy".into())]);
        let flow = BuyFlow::new(
            self.new_tracker(),
            Arc::clone(&self.router),
            Arc::clone(&self.services.store),
            self.services.stable_asset.clone(),
            preset_asset,
        );
        self.start_flow(Box::new(flow)).await;
    }

    pub async fn begin_sell(
        &self,
        preset_symbol: Option<String>,
        preset_percent: Option<Decimal>,
    ) {
        self.services
            .telemetry
            .track("user_command", &[("command", "sell".into())]);
        let flow = SellFlow::new(
            self.new_tracker(),
            Arc::clone(&self.router),
            Arc::clone(&self.services.store),
            self.services.stable_asset.clone(),
            preset_symbol,
            preset_percent,
        );
        self.start_flow(Box::new(flow)).await;
    }

    pub async fn begin_withdraw(&self) {
        self.services
            .telemetry
            .track("user_command", &[("command", "withdraw".into())]);
        let flow = WithdrawFlow::new(
            self.new_tracker(),
            Arc::clone(&self.router),
            Arc::clone(&self.services.transfer),
            Arc::clone(&self.wallet),
            self.services.retry,
        );
        self.start_flow(Box::new(flow)).await;
    }

    pub async fn has_active_flow(&self) -> bool {
        self.active_flow.lock().await.is_some()
    }

    /// Route a text message into the active flow. Returns true when a flow
    /// consumed the event.
    pub async fn handle_message(&self, text: &str) -> bool {
        self.services.telemetry.track("user_message", &[]);
        let mut slot = self.active_flow.lock().await;
        let Some(driver) = slot.as_mut() else {
            return false;
        };
        if driver.is_finished() {
            *slot = None;
            return false;
        }
        let handled = driver.dispatch_message(text).await;
        if driver.is_finished() {
            *slot = None;
        }
        handled
    }

    pub async fn handle_action(&self, action: &Action) -> bool {
        self.services
            .telemetry
            .track("user_action", &[("action", action.token())]);
        let mut slot = self.active_flow.lock().await;
        let Some(driver) = slot.as_mut() else {
            return false;
        };
        if driver.is_finished() {
            *slot = None;
            return false;
        }
        let handled = driver.dispatch_action(action).await;
        if driver.is_finished() {
            *slot = None;
        }
        handled
    }

    pub async fn handle_template_action(&self, action: &TemplateAction) -> bool {
        self.services
            .telemetry
            .track("user_action", &[("action", action.token())]);
        let mut slot = self.active_flow.lock().await;
        let Some(driver) = slot.as_mut() else {
            return false;
        };
        if driver.is_finished() {
            *slot = None;
            return false;
        }
        let handled = driver.dispatch_template_action(action).await;
        if driver.is_finished() {
            *slot = None;
        }
        handled
    }
}

struct SessionEntry {
    session: Arc<Session>,
    last_activity_ms: AtomicU64,
}

impl SessionEntry {
    fn new(session: Arc<Session>, epoch: Instant) -> Self {
        let entry = Self {
            session,
            last_activity_ms: AtomicU64::new(0),
        };
        entry.touch(epoch);
        entry
    }

    fn touch(&self, epoch: Instant) {
        self.last_activity_ms
            .store(epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    fn idle_for(&self, epoch: Instant) -> Duration {
        let now = epoch.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_activity_ms.load(Ordering::Relaxed)))
    }
}

/// Maps external user ids to live sessions.
pub struct SessionStore {
    services: SessionServices,
    sessions: RwLock<HashMap<UserId, SessionEntry>>,
    create_lock: tokio::sync::Mutex<()>,
    epoch: Instant,
    inactivity_threshold: Duration,
}

impl SessionStore {
    pub fn new(services: SessionServices, inactivity_threshold: Duration) -> Self {
        Self {
            services,
            sessions: RwLock::new(HashMap::new()),
            create_lock: tokio::sync::Mutex::new(()),
            epoch: Instant::now(),
            inactivity_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().unwrap().is_empty()
    }

    /// Fetch the user's session, constructing wallet and session lazily.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Arc<Session>, SessionError> {
        if let Some(entry) = self.sessions.read().unwrap().get(&user_id) {
            entry.touch(self.epoch);
            return Ok(Arc::clone(&entry.session));
        }

        let record = match self.services.store.wallet_by_user(user_id).await? {
            Some(record) => record,
            None => self.create_wallet_record(user_id).await?,
        };

        let wallet = UserWallet::from_encrypted(&record.encrypted_key, &self.services.cipher)
            .map_err(|e| SessionError::Wallet(e.to_string()))?;
        let session = Arc::new(Session::new(
            user_id,
            Arc::new(wallet),
            self.services.clone(),
        ));

        let mut sessions = self.sessions.write().unwrap();
        let entry = sessions
            .entry(user_id)
            .or_insert_with(|| SessionEntry::new(session, self.epoch));
        entry.touch(self.epoch);
        Ok(Arc::clone(&entry.session))
    }

    /// First-contact path: the double-checked section. The lock covers only
    /// the durable-record check and insert, so unrelated users never queue
    /// behind each other's wallet generation.
    async fn create_wallet_record(&self, user_id: UserId) -> Result<WalletRecord, SessionError> {
        let _guard = self.create_lock.lock().await;

        // a concurrent first contact may have won the race while we waited
        if let Some(record) = self.services.store.wallet_by_user(user_id).await? {
            return Ok(record);
        }

        let wallet = UserWallet::generate();
        let encrypted_key = wallet
            .to_encrypted(&self.services.cipher)
            .map_err(|e| SessionError::Wallet(e.to_string()))?;
        let record = WalletRecord {
            user_id,
            encrypted_key,
            address: wallet.address(),
            preferences: Preferences::default(),
            created_at: Utc::now(),
        };
        self.services.store.save_wallet(&record).await?;
        tracing::info!(user_id, address = %record.address, "wallet created on first contact");
        Ok(record)
    }

    /// Drop sessions idle past the threshold. Durable records are untouched;
    /// the next contact rebuilds the session from the store.
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.idle_for(self.epoch) <= self.inactivity_threshold);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "idle sessions evicted");
        }
        evicted
    }

    /// Periodic eviction task; stops once every other handle to the store
    /// is dropped.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(&self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}

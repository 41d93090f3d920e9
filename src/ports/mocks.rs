//! Recording mocks for every port
//!
//! Used by unit tests and the integration suite. Each mock records the calls
//! it receives and answers from programmed responses, so tests can assert
//! both behavior and call counts (probe-once guarantees, retry budgets,
//! cleanup deletions).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::chain::UserWallet;
use crate::domain::{AssetId, TokenInfo};

use super::chain::{BalanceReader, ChainError, TransferPort};
use super::chat::{Button, ChatError, ChatPort, MessageId, UserId};
use super::registry::{AssetRegistrySource, RegistryError, VerifiedAsset};
use super::store::{Preferences, StoreError, WalletRecord, WalletStore};
use super::telemetry::TelemetrySink;
use super::venue::{ExecutionReceipt, Venue, VenueError, VenueKind};

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// Programmed answer for a venue call.
#[derive(Debug, Clone)]
pub enum VenueAnswer {
    Amount(u64),
    RouteUnavailable,
    AssetNotFound,
    Network,
    ExecutionFailed(String),
}

impl VenueAnswer {
    fn to_result(&self, asset_in: &AssetId, asset_out: &AssetId) -> Result<u64, VenueError> {
        match self {
            VenueAnswer::Amount(v) => Ok(*v),
            VenueAnswer::RouteUnavailable => Err(VenueError::RouteUnavailable(
                asset_in.clone(),
                asset_out.clone(),
            )),
            VenueAnswer::AssetNotFound => Err(VenueError::AssetNotFound(asset_in.clone())),
            VenueAnswer::Network => Err(VenueError::Network("mock network fault".into())),
            VenueAnswer::ExecutionFailed(m) => Err(VenueError::ExecutionFailed(m.clone())),
        }
    }
}

/// Recorded execute invocation.
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: u64,
    pub min_amount_out: u64,
}

#[derive(Default)]
struct MockVenueState {
    quotes: HashMap<(AssetId, AssetId), VenueAnswer>,
    rates: HashMap<(AssetId, AssetId), Decimal>,
    tokens: HashMap<AssetId, TokenInfo>,
    execute: Option<Result<ExecutionReceipt, VenueAnswer>>,
    quote_calls: Vec<(AssetId, AssetId, u64)>,
    probe_calls: Vec<AssetId>,
    execute_calls: Vec<ExecuteCall>,
}

pub struct MockVenue {
    name: String,
    kind: VenueKind,
    state: Mutex<MockVenueState>,
}

impl MockVenue {
    pub fn pooled(name: &str) -> Self {
        Self::new(name, VenueKind::Pooled)
    }

    pub fn curve(name: &str) -> Self {
        Self::new(name, VenueKind::BondingCurve)
    }

    pub fn new(name: &str, kind: VenueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            state: Mutex::new(MockVenueState::default()),
        }
    }

    pub fn with_quote(self, asset_in: &AssetId, asset_out: &AssetId, amount_out: u64) -> Self {
        self.state.lock().unwrap().quotes.insert(
            (asset_in.clone(), asset_out.clone()),
            VenueAnswer::Amount(amount_out),
        );
        self
    }

    pub fn with_quote_answer(
        self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        answer: VenueAnswer,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .quotes
            .insert((asset_in.clone(), asset_out.clone()), answer);
        self
    }

    pub fn with_rate(self, asset_in: &AssetId, asset_out: &AssetId, rate: Decimal) -> Self {
        self.state
            .lock()
            .unwrap()
            .rates
            .insert((asset_in.clone(), asset_out.clone()), rate);
        self
    }

    pub fn with_token(self, info: TokenInfo) -> Self {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(info.asset_id.clone(), info);
        self
    }

    pub fn with_execution(self, tx_id: &str, amount_out: u64) -> Self {
        self.state.lock().unwrap().execute = Some(Ok(ExecutionReceipt {
            tx_id: tx_id.to_string(),
            amount_out,
        }));
        self
    }

    pub fn with_execution_error(self, answer: VenueAnswer) -> Self {
        self.state.lock().unwrap().execute = Some(Err(answer));
        self
    }

    pub fn quote_calls(&self) -> Vec<(AssetId, AssetId, u64)> {
        self.state.lock().unwrap().quote_calls.clone()
    }

    pub fn probe_count(&self, asset: &AssetId) -> usize {
        self.state
            .lock()
            .unwrap()
            .probe_calls
            .iter()
            .filter(|a| *a == asset)
            .count()
    }

    pub fn execute_calls(&self) -> Vec<ExecuteCall> {
        self.state.lock().unwrap().execute_calls.clone()
    }
}

#[async_trait]
impl Venue for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VenueKind {
        self.kind
    }

    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<u64, VenueError> {
        let answer = {
            let mut state = self.state.lock().unwrap();
            state
                .quote_calls
                .push((asset_in.clone(), asset_out.clone(), amount_in));
            state
                .quotes
                .get(&(asset_in.clone(), asset_out.clone()))
                .cloned()
        };
        answer
            .unwrap_or(VenueAnswer::RouteUnavailable)
            .to_result(asset_in, asset_out)
    }

    async fn rate(&self, asset_in: &AssetId, asset_out: &AssetId) -> Result<Decimal, VenueError> {
        self.state
            .lock()
            .unwrap()
            .rates
            .get(&(asset_in.clone(), asset_out.clone()))
            .copied()
            .ok_or_else(|| VenueError::RouteUnavailable(asset_in.clone(), asset_out.clone()))
    }

    async fn execute(
        &self,
        _wallet: &UserWallet,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
        min_amount_out: u64,
    ) -> Result<ExecutionReceipt, VenueError> {
        let programmed = {
            let mut state = self.state.lock().unwrap();
            state.execute_calls.push(ExecuteCall {
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                amount_in,
                min_amount_out,
            });
            state.execute.clone()
        };
        match programmed {
            Some(Ok(receipt)) => Ok(receipt),
            Some(Err(answer)) => Err(answer.to_result(asset_in, asset_out).unwrap_err()),
            None => Err(VenueError::ExecutionFailed("no execution programmed".into())),
        }
    }

    async fn token_info(&self, asset: &AssetId) -> Result<TokenInfo, VenueError> {
        let mut state = self.state.lock().unwrap();
        state.probe_calls.push(asset.clone());
        state
            .tokens
            .get(asset)
            .cloned()
            .ok_or_else(|| VenueError::AssetNotFound(asset.clone()))
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A message the mock transport delivered.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: MessageId,
    pub user: UserId,
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

#[derive(Default)]
pub struct MockChat {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentMessage>>,
    deleted: Mutex<Vec<MessageId>>,
    delete_faults: Mutex<u32>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` delete calls with a transport fault.
    pub fn fail_next_deletes(&self, n: u32) {
        *self.delete_faults.lock().unwrap() = n;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPort for MockChat {
    async fn send_message(
        &self,
        user: UserId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageId, ChatError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(SentMessage {
            id,
            user,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(id)
    }

    async fn delete_message(&self, _user: UserId, message: MessageId) -> Result<(), ChatError> {
        {
            let mut faults = self.delete_faults.lock().unwrap();
            if *faults > 0 {
                *faults -= 1;
                return Err(ChatError::Network("mock delete fault".into()));
            }
        }
        self.deleted.lock().unwrap().push(message);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wallet store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryWalletStore {
    records: tokio::sync::Mutex<HashMap<UserId, WalletRecord>>,
    read_delay: Option<std::time::Duration>,
    save_count: AtomicI64,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read to widen the first-contact race window in tests.
    pub fn with_read_delay(mut self, delay: std::time::Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn save_count(&self) -> i64 {
        self.save_count.load(Ordering::SeqCst)
    }

    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn wallet_by_user(&self, user: UserId) -> Result<Option<WalletRecord>, StoreError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.records.lock().await.get(&user).cloned())
    }

    async fn save_wallet(&self, record: &WalletRecord) -> Result<(), StoreError> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .await
            .insert(record.user_id, record.clone());
        Ok(())
    }

    async fn preferences(&self, user: UserId) -> Result<Option<Preferences>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&user)
            .map(|r| r.preferences.clone()))
    }

    async fn save_preferences(
        &self,
        user: UserId,
        preferences: &Preferences,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        match records.get_mut(&user) {
            Some(record) => {
                record.preferences = preferences.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("no wallet for user {user}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Recorded transfer invocation.
#[derive(Debug, Clone)]
pub struct TransferCall {
    pub from: String,
    pub destination: String,
    pub asset: AssetId,
    pub amount: u64,
}

#[derive(Default)]
pub struct MockChain {
    balances: Mutex<HashMap<AssetId, VecDeque<u64>>>,
    transfers: Mutex<Vec<TransferCall>>,
    transfer_fault: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed balance for an asset.
    pub fn with_balance(self, asset: &AssetId, amount: u64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.clone(), VecDeque::from([amount]));
        self
    }

    /// Queue of balances returned in order; the last one repeats. Used for
    /// before/after snapshot scenarios.
    pub fn with_balance_sequence(self, asset: &AssetId, amounts: &[u64]) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.clone(), amounts.iter().copied().collect());
        self
    }

    pub fn with_transfer_fault(self, reason: &str) -> Self {
        *self.transfer_fault.lock().unwrap() = Some(reason.to_string());
        self
    }

    pub fn transfers(&self) -> Vec<TransferCall> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl BalanceReader for MockChain {
    async fn balance_of(&self, _owner: &str, asset: &AssetId) -> Result<u64, ChainError> {
        let mut balances = self.balances.lock().unwrap();
        match balances.get_mut(asset) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) => Ok(*queue.front().unwrap_or(&0)),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl TransferPort for MockChain {
    async fn transfer(
        &self,
        wallet: &UserWallet,
        destination: &str,
        asset: &AssetId,
        amount: u64,
    ) -> Result<String, ChainError> {
        if let Some(reason) = self.transfer_fault.lock().unwrap().clone() {
            return Err(ChainError::Execution(reason));
        }
        self.transfers.lock().unwrap().push(TransferCall {
            from: wallet.address(),
            destination: destination.to_string(),
            asset: asset.clone(),
            amount,
        });
        Ok(format!("mock-tx-{}", self.transfers.lock().unwrap().len()))
    }

    fn is_valid_address(&self, address: &str) -> bool {
        address.len() >= 32 && address.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

// ---------------------------------------------------------------------------
// Registry + telemetry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockRegistrySource {
    assets: Mutex<Vec<VerifiedAsset>>,
    fail: Mutex<bool>,
}

impl MockRegistrySource {
    pub fn new(assets: Vec<VerifiedAsset>) -> Self {
        Self {
            assets: Mutex::new(assets),
            fail: Mutex::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    pub fn set_assets(&self, assets: Vec<VerifiedAsset>) {
        *self.assets.lock().unwrap() = assets;
    }
}

#[async_trait]
impl AssetRegistrySource for MockRegistrySource {
    async fn fetch(&self) -> Result<Vec<VerifiedAsset>, RegistryError> {
        if *self.fail.lock().unwrap() {
            return Err(RegistryError::Network("mock feed outage".into()));
        }
        Ok(self.assets.lock().unwrap().clone())
    }
}

/// Telemetry sink that remembers every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn track(&self, event: &str, props: &[(&str, String)]) {
        self.events.lock().unwrap().push((
            event.to_string(),
            props
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
    }
}

//! Buy flow
//!
//! INPUT_ASSET -> INPUT_AMOUNT -> CONFIRMATION -> COMPLETED. Resolves the
//! asset the user wants, shows its stable-asset price and the spendable
//! trade-asset balance, collects an amount (presets or free text), then
//! executes trade-asset -> asset on confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::router::{RouterError, SwapRouter};
use crate::domain::{AssetId, TokenInfo};
use crate::ports::chat::Button;
use crate::ports::store::WalletStore;

use super::{describe_swap_error, format_amount, Action, Flow, FlowError, FlowId, MessageTracker};

const ENTER_ASSET_TEXT: &str = "Which asset do you want to buy? Send its id.";
const ENTER_ASSET_ERROR_TEXT: &str = "Send a non-empty asset id.";
const INSUFFICIENT_FUNDS_TEXT: &str = "Your trade-asset balance is empty. Top up first.";
const AMOUNT_ERROR_TEXT: &str = "Enter an amount above zero and within your balance.";

fn spend_presets() -> [Decimal; 3] {
    [dec!(0.1), dec!(0.5), dec!(1)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuyStep {
    InputAsset,
    InputAmount,
    Confirmation,
    Completed,
}

pub struct BuyFlow {
    tracker: MessageTracker,
    router: Arc<SwapRouter>,
    store: Arc<dyn WalletStore>,
    stable_asset: AssetId,
    step: BuyStep,
    asset: Option<TokenInfo>,
    trade_balance: Decimal,
    amount_to_spend: Option<Decimal>,
    preset_asset: Option<AssetId>,
    successful: bool,
}

impl BuyFlow {
    pub fn new(
        tracker: MessageTracker,
        router: Arc<SwapRouter>,
        store: Arc<dyn WalletStore>,
        stable_asset: AssetId,
        preset_asset: Option<AssetId>,
    ) -> Self {
        Self {
            tracker,
            router,
            store,
            stable_asset,
            step: BuyStep::InputAsset,
            asset: None,
            trade_balance: Decimal::ZERO,
            amount_to_spend: None,
            preset_asset,
            successful: false,
        }
    }

    /// Stable-asset unit price, derived from a fixed-size probe quote.
    async fn stable_price(&self, asset: &AssetId) -> String {
        let probe = dec!(100);
        match self.router.quote_best(&self.stable_asset, asset, probe).await {
            Ok(quote) => {
                let tokens = quote.amount_out_readable(self.router.dust_threshold());
                if tokens > Decimal::ZERO {
                    format_amount(probe / tokens)
                } else {
                    "?".into()
                }
            }
            Err(_) => "?".into(),
        }
    }

    async fn process_asset(&mut self, asset_id: AssetId) -> Result<(), FlowError> {
        let info = match self.router.token_info(&asset_id).await {
            Ok(info) => info,
            Err(e) => {
                return match describe_swap_error(&e) {
                    Some(message) => {
                        // stay in INPUT_ASSET so the user can try another id
                        self.tracker.send(&message).await?;
                        Ok(())
                    }
                    None => Err(FlowError::Internal(e.to_string())),
                };
            }
        };

        let trade_asset = self.router.trade_asset().clone();
        self.trade_balance = self
            .router
            .balance_of(&trade_asset)
            .await
            .map_err(|e| FlowError::Internal(e.to_string()))?;
        if self.trade_balance <= Decimal::ZERO {
            self.tracker.notify(INSUFFICIENT_FUNDS_TEXT).await?;
            self.step = BuyStep::Completed;
            return Ok(());
        }

        let price = self.stable_price(&info.asset_id).await;
        let prompt = format!(
            "Buying {} ({}). Price ~{} stable. You hold {} of the trade asset. How much do you want to spend?",
            info.symbol,
            info.name,
            price,
            format_amount(self.trade_balance)
        );
        self.asset = Some(info);
        self.step = BuyStep::InputAmount;

        let buttons: Vec<Button> = spend_presets()
            .iter()
            .map(|preset| Button::new(format_amount(*preset), Action::Amount(*preset).token()))
            .collect();
        self.tracker.send_with_buttons(&prompt, vec![buttons]).await?;
        Ok(())
    }

    async fn confirm_purchase(&mut self, amount: Decimal) -> Result<(), FlowError> {
        let info = self
            .asset
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset resolved".into()))?;
        let trade_asset = self.router.trade_asset().clone();

        match self
            .router
            .quote_best(&trade_asset, &info.asset_id, amount)
            .await
        {
            Ok(quote) => {
                self.amount_to_spend = Some(amount);
                self.step = BuyStep::Confirmation;
                let expected = quote.amount_out_readable(self.router.dust_threshold());
                self.tracker
                    .send_with_buttons(
                        &format!(
                            "Spend {} of the trade asset for about {} {} via {}?",
                            format_amount(amount),
                            format_amount(expected),
                            info.symbol,
                            quote.venue
                        ),
                        vec![vec![
                            Button::new("Confirm", Action::Accept.token()),
                            Button::new("Cancel", Action::Cancel.token()),
                        ]],
                    )
                    .await?;
                Ok(())
            }
            Err(e) => match describe_swap_error(&e) {
                Some(message) => {
                    self.tracker.send(&message).await?;
                    Ok(())
                }
                None => Err(FlowError::Internal(e.to_string())),
            },
        }
    }

    async fn execute_purchase(&mut self) -> Result<(), FlowError> {
        let info = self
            .asset
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset resolved".into()))?;
        let amount = self
            .amount_to_spend
            .ok_or_else(|| FlowError::Internal("no amount selected".into()))?;
        let trade_asset = self.router.trade_asset().clone();

        let slippage_bps = self
            .store
            .preferences(self.tracker.user_id())
            .await?
            .unwrap_or_default()
            .slippage_bps;

        match self
            .router
            .execute(&trade_asset, &info.asset_id, amount, slippage_bps)
            .await
        {
            Ok(outcome) => {
                self.tracker
                    .notify(&format!(
                        "Bought {} {} via {}.",
                        format_amount(outcome.amount_out),
                        info.symbol,
                        outcome.venue
                    ))
                    .await?;
                self.successful = true;
                self.step = BuyStep::Completed;
                Ok(())
            }
            Err(RouterError::ExecutionFailed { venue, reason }) => {
                self.tracker
                    .notify(&format!("Buy failed on {venue}: {reason}"))
                    .await?;
                self.step = BuyStep::Completed;
                Ok(())
            }
            Err(e) => match describe_swap_error(&e) {
                Some(message) => {
                    self.tracker.send(&message).await?;
                    Ok(())
                }
                None => Err(FlowError::Internal(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl Flow for BuyFlow {
    fn id(&self) -> FlowId {
        FlowId::Buy
    }

    fn is_finished(&self) -> bool {
        self.step == BuyStep::Completed
    }

    fn succeeded(&self) -> bool {
        self.successful
    }

    fn terminate(&mut self) {
        self.step = BuyStep::Completed;
    }

    fn tracker_mut(&mut self) -> &mut MessageTracker {
        &mut self.tracker
    }

    async fn start(&mut self) -> Result<(), FlowError> {
        match self.preset_asset.take() {
            Some(asset) => self.process_asset(asset).await,
            None => {
                self.tracker.send(ENTER_ASSET_TEXT).await?;
                Ok(())
            }
        }
    }

    async fn on_message(&mut self, text: &str) -> Result<bool, FlowError> {
        match self.step {
            BuyStep::InputAsset => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    self.tracker.send(ENTER_ASSET_ERROR_TEXT).await?;
                    return Ok(false);
                }
                self.process_asset(AssetId::new(trimmed)).await?;
                Ok(true)
            }
            BuyStep::InputAmount => {
                let amount: Option<Decimal> = text.trim().parse().ok();
                match amount {
                    Some(a) if a > Decimal::ZERO && a <= self.trade_balance => {
                        self.confirm_purchase(a).await?;
                        Ok(true)
                    }
                    _ => {
                        self.tracker.send(AMOUNT_ERROR_TEXT).await?;
                        Ok(false)
                    }
                }
            }
            _ => Ok(false),
        }
    }

    async fn on_action(&mut self, action: &Action) -> Result<bool, FlowError> {
        match (self.step, action) {
            (BuyStep::InputAmount, Action::Amount(amount)) => {
                if *amount > self.trade_balance {
                    self.tracker.send(AMOUNT_ERROR_TEXT).await?;
                    return Ok(false);
                }
                self.confirm_purchase(*amount).await?;
                Ok(true)
            }
            (BuyStep::Confirmation, Action::Cancel) => {
                self.step = BuyStep::Completed;
                Ok(true)
            }
            (BuyStep::Confirmation, Action::Accept) => {
                self.execute_purchase().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

//! Withdraw flow
//!
//! ASSET_SELECTION -> INPUT_ADDRESS -> INPUT_AMOUNT -> CONFIRMATION ->
//! COMPLETED. Picks a held asset, validates the destination address against
//! the chain format, collects an amount (100% button or free text), and
//! transfers with the network fee deducted from the sent amount.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::chain::UserWallet;
use crate::application::retry::RetryPolicy;
use crate::application::router::{Holding, SwapRouter};
use crate::domain::amount::to_base_units;
use crate::ports::chain::{ChainError, TransferPort};
use crate::ports::chat::Button;

use super::{format_amount, Action, Flow, FlowError, FlowId, MessageTracker, TemplateAction};

const NO_FUNDS_TEXT: &str = "You have nothing to withdraw yet.";
const SELECT_ASSET_ERROR_TEXT: &str =
    "That asset is not in your holdings. Pick one of the buttons.";
const WRONG_STEP_TEXT: &str = "That choice does not fit this step. Use the latest prompt.";
const NO_METADATA_TEXT: &str =
    "That asset's metadata is unavailable right now, so it cannot be withdrawn.";
const INVALID_ADDRESS_TEXT: &str = "That does not look like a valid address. Try again.";
const AMOUNT_PARSE_ERROR_TEXT: &str = "Enter an amount above zero.";
const AMOUNT_EXCEEDS_TEXT: &str = "Amount exceeds your balance.";
const FEE_EXCEEDS_TEXT: &str =
    "That amount cannot cover the network fee. Withdraw a larger amount.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WithdrawStep {
    AssetSelection,
    InputAddress,
    InputAmount,
    Confirmation,
    Completed,
}

pub struct WithdrawFlow {
    tracker: MessageTracker,
    router: Arc<SwapRouter>,
    transfer: Arc<dyn TransferPort>,
    wallet: Arc<UserWallet>,
    retry: RetryPolicy,
    step: WithdrawStep,
    holdings: Vec<Holding>,
    selected: Option<Holding>,
    destination: Option<String>,
    amount: Option<Decimal>,
    successful: bool,
}

impl WithdrawFlow {
    pub fn new(
        tracker: MessageTracker,
        router: Arc<SwapRouter>,
        transfer: Arc<dyn TransferPort>,
        wallet: Arc<UserWallet>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            tracker,
            router,
            transfer,
            wallet,
            retry,
            step: WithdrawStep::AssetSelection,
            holdings: Vec::new(),
            selected: None,
            destination: None,
            amount: None,
            successful: false,
        }
    }

    fn short_address(address: &str) -> String {
        if address.len() <= 12 {
            address.to_string()
        } else {
            format!("{}...{}", &address[..6], &address[address.len() - 4..])
        }
    }

    async fn select_asset(&mut self, symbol: &str) -> Result<bool, FlowError> {
        let Some(holding) = self.holdings.iter().find(|h| h.symbol() == symbol).cloned() else {
            self.tracker.send(SELECT_ASSET_ERROR_TEXT).await?;
            return Ok(true);
        };
        if holding.info.is_none() {
            // without decimals there is no safe base-unit conversion
            self.tracker.send(NO_METADATA_TEXT).await?;
            return Ok(true);
        }

        self.step = WithdrawStep::InputAddress;
        let prompt = format!(
            "You hold {} {}. Send the destination address.",
            format_amount(holding.amount),
            holding.symbol()
        );
        self.selected = Some(holding);
        self.tracker.send(&prompt).await?;
        Ok(true)
    }

    async fn prompt_amount(&mut self) -> Result<(), FlowError> {
        self.step = WithdrawStep::InputAmount;
        self.tracker
            .send_with_buttons(
                "How much should be withdrawn?",
                vec![vec![Button::new("100%", Action::Percent(100).token())]],
            )
            .await?;
        Ok(())
    }

    async fn confirm_transfer(&mut self, amount: Decimal) -> Result<(), FlowError> {
        let holding = self
            .selected
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset selected".into()))?;
        let destination = self
            .destination
            .clone()
            .ok_or_else(|| FlowError::Internal("no destination entered".into()))?;

        self.amount = Some(amount);
        self.step = WithdrawStep::Confirmation;
        self.tracker
            .send_with_buttons(
                &format!(
                    "{} {} -> {}",
                    format_amount(amount),
                    holding.symbol(),
                    Self::short_address(&destination)
                ),
                vec![vec![
                    Button::new("Confirm", Action::Accept.token()),
                    Button::new("Cancel", Action::Cancel.token()),
                ]],
            )
            .await?;
        Ok(())
    }

    async fn execute_transfer(&mut self) -> Result<(), FlowError> {
        let holding = self
            .selected
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset selected".into()))?;
        let destination = self
            .destination
            .clone()
            .ok_or_else(|| FlowError::Internal("no destination entered".into()))?;
        let amount = self
            .amount
            .ok_or_else(|| FlowError::Internal("no amount entered".into()))?;
        let info = holding
            .info
            .clone()
            .ok_or_else(|| FlowError::Internal("asset metadata missing".into()))?;

        let units = to_base_units(amount, info.decimals)
            .map_err(|e| FlowError::Internal(e.to_string()))?;

        let transfer = Arc::clone(&self.transfer);
        let wallet = Arc::clone(&self.wallet);
        let result = self
            .retry
            .run_network(|| transfer.transfer(&wallet, &destination, &holding.asset_id, units))
            .await;

        match result {
            Ok(tx_id) => {
                self.tracker
                    .notify(&format!(
                        "Withdrew {} {} to {}. Transaction: {tx_id}",
                        format_amount(amount),
                        holding.symbol(),
                        Self::short_address(&destination)
                    ))
                    .await?;
                self.successful = true;
                self.step = WithdrawStep::Completed;
                Ok(())
            }
            Err(ChainError::FeeExceedsAmount) => {
                // recoverable: let the user pick a bigger amount
                self.tracker.send(FEE_EXCEEDS_TEXT).await?;
                self.prompt_amount().await?;
                Ok(())
            }
            Err(ChainError::InvalidAddress(_)) => {
                self.tracker.send(INVALID_ADDRESS_TEXT).await?;
                self.step = WithdrawStep::InputAddress;
                Ok(())
            }
            Err(e) => {
                self.tracker
                    .notify(&format!("Withdraw failed: {e}"))
                    .await?;
                self.step = WithdrawStep::Completed;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Flow for WithdrawFlow {
    fn id(&self) -> FlowId {
        FlowId::Withdraw
    }

    fn is_finished(&self) -> bool {
        self.step == WithdrawStep::Completed
    }

    fn succeeded(&self) -> bool {
        self.successful
    }

    fn terminate(&mut self) {
        self.step = WithdrawStep::Completed;
    }

    fn tracker_mut(&mut self) -> &mut MessageTracker {
        &mut self.tracker
    }

    async fn start(&mut self) -> Result<(), FlowError> {
        self.holdings = self
            .router
            .balances()
            .await
            .map_err(|e| FlowError::Internal(e.to_string()))?;
        if self.holdings.is_empty() {
            self.tracker.notify(NO_FUNDS_TEXT).await?;
            self.step = WithdrawStep::Completed;
            return Ok(());
        }

        let buttons: Vec<Button> = self
            .holdings
            .iter()
            .map(|h| Button::new(h.symbol(), TemplateAction::Withdraw(h.symbol()).token()))
            .collect();
        let rows: Vec<Vec<Button>> = buttons.chunks(3).map(|c| c.to_vec()).collect();
        self.tracker
            .send_with_buttons("Which asset do you want to withdraw?", rows)
            .await?;
        Ok(())
    }

    async fn on_message(&mut self, text: &str) -> Result<bool, FlowError> {
        match self.step {
            WithdrawStep::InputAddress => {
                let address = text.trim();
                if !self.transfer.is_valid_address(address) {
                    self.tracker.send(INVALID_ADDRESS_TEXT).await?;
                    return Ok(true);
                }
                self.destination = Some(address.to_string());
                self.prompt_amount().await?;
                Ok(true)
            }
            WithdrawStep::InputAmount => {
                let balance = self.selected.as_ref().map(|h| h.amount).unwrap_or_default();
                let amount: Option<Decimal> = text.trim().parse().ok();
                match amount {
                    Some(a) if a > Decimal::ZERO && a <= balance => {
                        self.confirm_transfer(a).await?;
                        Ok(true)
                    }
                    Some(a) if a > balance => {
                        self.tracker.send(AMOUNT_EXCEEDS_TEXT).await?;
                        Ok(true)
                    }
                    _ => {
                        self.tracker.send(AMOUNT_PARSE_ERROR_TEXT).await?;
                        Ok(true)
                    }
                }
            }
            _ => Ok(false),
        }
    }

    async fn on_action(&mut self, action: &Action) -> Result<bool, FlowError> {
        match (self.step, action) {
            (WithdrawStep::InputAmount, Action::Percent(100)) => {
                let balance = self.selected.as_ref().map(|h| h.amount).unwrap_or_default();
                self.confirm_transfer(balance).await?;
                Ok(true)
            }
            (WithdrawStep::Confirmation, Action::Cancel) => {
                self.step = WithdrawStep::Completed;
                Ok(true)
            }
            (WithdrawStep::Confirmation, Action::Accept) => {
                self.execute_transfer().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn on_template_action(&mut self, action: &TemplateAction) -> Result<bool, FlowError> {
        let TemplateAction::Withdraw(symbol) = action else {
            self.tracker.notify(WRONG_STEP_TEXT).await?;
            return Ok(false);
        };
        if self.step != WithdrawStep::AssetSelection {
            self.tracker.notify(WRONG_STEP_TEXT).await?;
            return Ok(false);
        }
        self.select_asset(symbol).await
    }
}

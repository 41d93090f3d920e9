//! Sell flow
//!
//! SELECT_ASSET -> INPUT_PERCENTAGE -> CONFIRMATION -> COMPLETED. Lists the
//! wallet's non-trade-asset holdings with stable-asset valuations, collects a
//! percentage (buttons or free text), previews the expected output, and
//! executes against the best venue on confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::router::{Holding, RouterError, SwapRouter};
use crate::domain::AssetId;
use crate::ports::chat::Button;
use crate::ports::store::WalletStore;

use super::{
    describe_swap_error, format_amount, Action, Flow, FlowError, FlowId, MessageTracker,
    TemplateAction,
};

const NO_ASSETS_TEXT: &str = "You have nothing to sell yet.";
const SELECT_ASSET_ERROR_TEXT: &str = "That asset is not in your holdings. Pick one of the buttons.";
const WRONG_STEP_TEXT: &str = "That choice does not fit this step. Use the latest prompt.";
const PERCENTAGE_ERROR_TEXT: &str = "Enter a percentage between 1 and 100.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SellStep {
    SelectAsset,
    InputPercentage,
    Confirmation,
    Completed,
}

pub struct SellFlow {
    tracker: MessageTracker,
    router: Arc<SwapRouter>,
    store: Arc<dyn WalletStore>,
    stable_asset: AssetId,
    step: SellStep,
    holdings: Vec<Holding>,
    selected: Option<Holding>,
    amount_to_sell: Option<Decimal>,
    preset_symbol: Option<String>,
    preset_percent: Option<Decimal>,
    successful: bool,
}

impl SellFlow {
    pub fn new(
        tracker: MessageTracker,
        router: Arc<SwapRouter>,
        store: Arc<dyn WalletStore>,
        stable_asset: AssetId,
        preset_symbol: Option<String>,
        preset_percent: Option<Decimal>,
    ) -> Self {
        Self {
            tracker,
            router,
            store,
            stable_asset,
            step: SellStep::SelectAsset,
            holdings: Vec::new(),
            selected: None,
            amount_to_sell: None,
            preset_symbol,
            preset_percent,
            successful: false,
        }
    }

    async fn load_holdings(&mut self) -> Result<(), FlowError> {
        let trade_asset = self.router.trade_asset().clone();
        self.holdings = self
            .router
            .balances()
            .await
            .map_err(|e| FlowError::Internal(e.to_string()))?
            .into_iter()
            .filter(|h| h.asset_id != trade_asset)
            .collect();
        Ok(())
    }

    /// Stable-asset valuation for the listing; unpriceable assets show "?".
    async fn valuation(&self, holding: &Holding) -> String {
        if holding.asset_id == self.stable_asset {
            return format_amount(holding.amount);
        }
        match self
            .router
            .rate(&holding.asset_id, &self.stable_asset)
            .await
        {
            Ok(rate) => format_amount(holding.amount * rate),
            Err(_) => "?".into(),
        }
    }

    async fn show_asset_selection(&mut self) -> Result<(), FlowError> {
        let mut lines = Vec::with_capacity(self.holdings.len());
        for holding in &self.holdings {
            let value = self.valuation(holding).await;
            lines.push(format!(
                "{}: {} ({} stable)",
                holding.symbol(),
                format_amount(holding.amount),
                value
            ));
        }

        let buttons: Vec<Button> = self
            .holdings
            .iter()
            .map(|h| Button::new(h.symbol(), TemplateAction::Sell(h.symbol()).token()))
            .collect();
        let rows: Vec<Vec<Button>> = buttons.chunks(3).map(|c| c.to_vec()).collect();

        self.tracker
            .send_with_buttons(
                &format!("Which asset do you want to sell?\n{}", lines.join("\n")),
                rows,
            )
            .await?;
        Ok(())
    }

    async fn select_symbol(&mut self, symbol: &str) -> Result<bool, FlowError> {
        let Some(holding) = self.holdings.iter().find(|h| h.symbol() == symbol).cloned() else {
            self.tracker.send(SELECT_ASSET_ERROR_TEXT).await?;
            return Ok(false);
        };
        self.selected = Some(holding);
        self.prompt_percentage().await?;
        Ok(true)
    }

    async fn prompt_percentage(&mut self) -> Result<(), FlowError> {
        let symbol = self.selected.as_ref().map(|h| h.symbol()).unwrap_or_default();
        self.step = SellStep::InputPercentage;
        self.tracker
            .send_with_buttons(
                &format!("What percentage of your {symbol} should be sold?"),
                vec![vec![
                    Button::new("25%", Action::Percent(25).token()),
                    Button::new("50%", Action::Percent(50).token()),
                    Button::new("100%", Action::Percent(100).token()),
                ]],
            )
            .await?;
        Ok(())
    }

    async fn confirm_sale(&mut self, percent: Decimal) -> Result<(), FlowError> {
        let holding = self
            .selected
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset selected".into()))?;
        let amount = holding.amount * percent / dec!(100);
        let trade_asset = self.router.trade_asset().clone();

        match self
            .router
            .quote_best(&holding.asset_id, &trade_asset, amount)
            .await
        {
            Ok(quote) => {
                self.amount_to_sell = Some(amount);
                self.step = SellStep::Confirmation;
                let expected = quote.amount_out_readable(self.router.dust_threshold());
                self.tracker
                    .send_with_buttons(
                        &format!(
                            "Sell {} {} for about {} via {}?",
                            format_amount(amount),
                            holding.symbol(),
                            format_amount(expected),
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
                // re-prompt in place; the percentage step stays active
                Some(message) => {
                    self.tracker.send(&message).await?;
                    Ok(())
                }
                None => Err(FlowError::Internal(e.to_string())),
            },
        }
    }

    async fn execute_sale(&mut self) -> Result<(), FlowError> {
        let holding = self
            .selected
            .clone()
            .ok_or_else(|| FlowError::Internal("no asset selected".into()))?;
        let amount = self
            .amount_to_sell
            .ok_or_else(|| FlowError::Internal("no amount computed".into()))?;
        let trade_asset = self.router.trade_asset().clone();

        let slippage_bps = self
            .store
            .preferences(self.tracker.user_id())
            .await?
            .unwrap_or_default()
            .slippage_bps;

        match self
            .router
            .execute(&holding.asset_id, &trade_asset, amount, slippage_bps)
            .await
        {
            Ok(outcome) => {
                self.tracker
                    .notify(&format!(
                        "Sold {} {} for {} via {}.",
                        format_amount(amount),
                        holding.symbol(),
                        format_amount(outcome.amount_out),
                        outcome.venue
                    ))
                    .await?;
                self.successful = true;
                self.step = SellStep::Completed;
                Ok(())
            }
            Err(RouterError::ExecutionFailed { venue, reason }) => {
                // submission was attempted and definitively failed
                self.tracker
                    .notify(&format!("Sell failed on {venue}: {reason}"))
                    .await?;
                self.step = SellStep::Completed;
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
impl Flow for SellFlow {
    fn id(&self) -> FlowId {
        FlowId::Sell
    }

    fn is_finished(&self) -> bool {
        self.step == SellStep::Completed
    }

    fn succeeded(&self) -> bool {
        self.successful
    }

    fn terminate(&mut self) {
        self.step = SellStep::Completed;
    }

    fn tracker_mut(&mut self) -> &mut MessageTracker {
        &mut self.tracker
    }

    async fn start(&mut self) -> Result<(), FlowError> {
        self.load_holdings().await?;
        if self.holdings.is_empty() {
            self.tracker.notify(NO_ASSETS_TEXT).await?;
            self.step = SellStep::Completed;
            return Ok(());
        }

        if let Some(symbol) = self.preset_symbol.take() {
            if self.select_symbol(&symbol).await? {
                if let Some(percent) = self.preset_percent.take() {
                    if percent <= Decimal::ZERO || percent > dec!(100) {
                        self.tracker.notify(PERCENTAGE_ERROR_TEXT).await?;
                        self.step = SellStep::Completed;
                    } else {
                        self.confirm_sale(percent).await?;
                    }
                }
            } else {
                self.step = SellStep::Completed;
            }
            return Ok(());
        }

        self.show_asset_selection().await
    }

    async fn on_message(&mut self, text: &str) -> Result<bool, FlowError> {
        if self.step == SellStep::InputPercentage {
            let percent: Option<Decimal> = text.trim().parse().ok();
            match percent {
                Some(p) if p >= Decimal::ONE && p <= dec!(100) => {
                    self.confirm_sale(p).await?;
                    Ok(true)
                }
                _ => {
                    self.tracker.send(PERCENTAGE_ERROR_TEXT).await?;
                    Ok(false)
                }
            }
        } else {
            Ok(false)
        }
    }

    async fn on_action(&mut self, action: &Action) -> Result<bool, FlowError> {
        match (self.step, action) {
            (SellStep::InputPercentage, Action::Percent(p)) => {
                self.confirm_sale(Decimal::from(*p)).await?;
                Ok(true)
            }
            (SellStep::Confirmation, Action::Cancel) => {
                self.step = SellStep::Completed;
                Ok(true)
            }
            (SellStep::Confirmation, Action::Accept) => {
                self.execute_sale().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn on_template_action(&mut self, action: &TemplateAction) -> Result<bool, FlowError> {
        let TemplateAction::Sell(symbol) = action else {
            self.tracker.notify(WRONG_STEP_TEXT).await?;
            return Ok(false);
        };
        if self.step != SellStep::SelectAsset {
            self.tracker.notify(WRONG_STEP_TEXT).await?;
            return Ok(false);
        }
        self.select_symbol(symbol).await
    }
}

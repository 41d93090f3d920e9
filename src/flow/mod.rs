//! Conversational transaction flows
//!
//! A Flow is a stateful, user-bound confirmation dialog: each user event
//! either re-prompts in place (validation failure) or advances the state
//! machine, and every prompt the flow sends is tracked so the whole dialog
//! can be erased once it ends. Shared behavior (message tracking, cleanup,
//! completion signaling) lives in [`MessageTracker`] and [`FlowDriver`], not
//! in a base type; each flow variant is an independent state machine behind
//! the [`Flow`] trait.

pub mod buy;
pub mod sell;
pub mod withdraw;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::application::resolver::ResolveError;
use crate::application::retry::RetryPolicy;
use crate::application::router::RouterError;
use crate::ports::chat::{Button, ChatError, ChatPort, MessageId, UserId};
use crate::ports::store::StoreError;

pub use buy::BuyFlow;
pub use sell::SellFlow;
pub use withdraw::WithdrawFlow;

/// Generic failure message for faults the user cannot act on.
pub const GENERIC_ERROR_TEXT: &str = "Something went wrong. Please try again later.";

/// Identifies a flow variant in completion callbacks and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowId {
    Buy,
    Sell,
    Withdraw,
}

impl FlowId {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowId::Buy => "buy",
            FlowId::Sell => "sell",
            FlowId::Withdraw => "withdraw",
        }
    }
}

/// Button actions shared across flows. The token is what the transport
/// echoes back when the button is pressed.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Accept,
    Cancel,
    /// Percentage preset (25, 50, 100).
    Percent(u8),
    /// Spend-amount preset in readable units of the trade asset.
    Amount(Decimal),
}

impl Action {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "accept" => Some(Action::Accept),
            "cancel" => Some(Action::Cancel),
            _ => {
                if let Some(percent) = token.strip_prefix("percent:") {
                    percent.parse().ok().map(Action::Percent)
                } else if let Some(amount) = token.strip_prefix("amount:") {
                    amount.parse().ok().map(Action::Amount)
                } else {
                    None
                }
            }
        }
    }

    pub fn token(&self) -> String {
        match self {
            Action::Accept => "accept".into(),
            Action::Cancel => "cancel".into(),
            Action::Percent(p) => format!("percent:{p}"),
            Action::Amount(a) => format!("amount:{a}"),
        }
    }
}

/// Parameterized button actions carrying a selection payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateAction {
    /// Sell the holding with this symbol.
    Sell(String),
    /// Withdraw the holding with this symbol.
    Withdraw(String),
}

impl TemplateAction {
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(symbol) = token.strip_prefix("sell:") {
            Some(TemplateAction::Sell(symbol.to_string()))
        } else {
            token
                .strip_prefix("withdraw:")
                .map(|symbol| TemplateAction::Withdraw(symbol.to_string()))
        }
    }

    pub fn token(&self) -> String {
        match self {
            TemplateAction::Sell(symbol) => format!("sell:{symbol}"),
            TemplateAction::Withdraw(symbol) => format!("withdraw:{symbol}"),
        }
    }
}

/// Faults a flow cannot translate into a re-prompt. The driver terminates
/// the flow and reports a generic failure.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal fault: {0}")]
    Internal(String),
}

/// Display formatting for token amounts: six significant decimal places,
/// trailing zeros dropped.
pub fn format_amount(amount: Decimal) -> String {
    amount.round_dp(6).normalize().to_string()
}

/// Re-promptable description of a routing failure, or `None` when the fault
/// is internal and must terminate the flow.
pub fn describe_swap_error(error: &RouterError) -> Option<String> {
    match error {
        RouterError::SlippageExhausted => Some(
            "The quoted output cannot cover slippage and fees. Try a larger amount or a higher slippage tolerance.".into(),
        ),
        RouterError::NoRoute => Some("No venue can serve this pair right now.".into()),
        RouterError::MixedClassPair => Some(
            "These assets trade on different venue types. Swap through the trade asset instead.".into(),
        ),
        RouterError::InvalidSlippage(bps) => {
            Some(format!("Slippage tolerance {bps} bps is out of range."))
        }
        RouterError::Resolve(ResolveError::NotFound(asset)) => {
            Some(format!("Unknown asset: {asset}."))
        }
        _ => None,
    }
}

/// Tracks every prompt a flow sends so the dialog can be erased when the
/// flow ends. Cleanup is best-effort and runs at most once.
pub struct MessageTracker {
    chat: Arc<dyn ChatPort>,
    user_id: UserId,
    retry: RetryPolicy,
    sent: Vec<MessageId>,
    cleaned: bool,
}

impl MessageTracker {
    pub fn new(chat: Arc<dyn ChatPort>, user_id: UserId, retry: RetryPolicy) -> Self {
        Self {
            chat,
            user_id,
            retry,
            sent: Vec::new(),
            cleaned: false,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Send a tracked prompt; it will be deleted by `cleanup`.
    pub async fn send(&mut self, text: &str) -> Result<(), ChatError> {
        let id = self.chat.send_message(self.user_id, text, &[]).await?;
        self.sent.push(id);
        Ok(())
    }

    /// Send a tracked prompt with buttons.
    pub async fn send_with_buttons(
        &mut self,
        text: &str,
        buttons: Vec<Vec<Button>>,
    ) -> Result<(), ChatError> {
        let id = self.chat.send_message(self.user_id, text, &buttons).await?;
        self.sent.push(id);
        Ok(())
    }

    /// Send an untracked message that survives cleanup (final results,
    /// error reports).
    pub async fn notify(&self, text: &str) -> Result<(), ChatError> {
        self.chat.send_message(self.user_id, text, &[]).await?;
        Ok(())
    }

    /// Delete every tracked prompt. Failures are logged, never raised.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        for id in std::mem::take(&mut self.sent) {
            let chat = Arc::clone(&self.chat);
            let user = self.user_id;
            if let Err(e) = self.retry.run_all(|| chat.delete_message(user, id)).await {
                tracing::warn!(user, message = id, error = %e, "failed to delete flow prompt");
            }
        }
    }

    #[cfg(test)]
    pub fn tracked_count(&self) -> usize {
        self.sent.len()
    }
}

/// A multi-step user-confirmed action. Handlers validate the event against
/// the current state and either re-prompt (returning without a transition)
/// or advance; `true` means the event was consumed.
#[async_trait]
pub trait Flow: Send {
    fn id(&self) -> FlowId;

    /// Terminal-state check; the driver cleans up once this turns true.
    fn is_finished(&self) -> bool;

    /// Distinct from finished: a cancelled confirmation is finished but not
    /// successful. Callers refresh balance displays only on success.
    fn succeeded(&self) -> bool;

    /// Force the flow into a finished-unsuccessful terminal state.
    fn terminate(&mut self);

    fn tracker_mut(&mut self) -> &mut MessageTracker;

    /// Enter the initial state and emit the first prompt.
    async fn start(&mut self) -> Result<(), FlowError>;

    async fn on_message(&mut self, text: &str) -> Result<bool, FlowError>;

    async fn on_action(&mut self, action: &Action) -> Result<bool, FlowError>;

    async fn on_template_action(&mut self, _action: &TemplateAction) -> Result<bool, FlowError> {
        Ok(false)
    }
}

/// Completion signal: flow identifier plus the success flag.
pub type CompletionCallback = Box<dyn Fn(FlowId, bool) + Send + Sync>;

/// Drives a flow through its lifecycle: dispatches events, terminates on
/// internal faults, and guarantees cleanup and the completion callback fire
/// exactly once.
pub struct FlowDriver {
    flow: Box<dyn Flow>,
    on_complete: Option<CompletionCallback>,
    notified: bool,
}

impl FlowDriver {
    pub fn new(flow: Box<dyn Flow>, on_complete: Option<CompletionCallback>) -> Self {
        Self {
            flow,
            on_complete,
            notified: false,
        }
    }

    pub fn id(&self) -> FlowId {
        self.flow.id()
    }

    pub fn is_finished(&self) -> bool {
        self.flow.is_finished()
    }

    pub async fn start(&mut self) {
        if let Err(e) = self.flow.start().await {
            self.fail(e).await;
        }
        self.check_finished().await;
    }

    pub async fn dispatch_message(&mut self, text: &str) -> bool {
        if self.flow.is_finished() {
            return false;
        }
        let handled = match self.flow.on_message(text).await {
            Ok(handled) => handled,
            Err(e) => {
                self.fail(e).await;
                true
            }
        };
        self.check_finished().await;
        handled
    }

    pub async fn dispatch_action(&mut self, action: &Action) -> bool {
        if self.flow.is_finished() {
            return false;
        }
        let handled = match self.flow.on_action(action).await {
            Ok(handled) => handled,
            Err(e) => {
                self.fail(e).await;
                true
            }
        };
        self.check_finished().await;
        handled
    }

    pub async fn dispatch_template_action(&mut self, action: &TemplateAction) -> bool {
        if self.flow.is_finished() {
            return false;
        }
        let handled = match self.flow.on_template_action(action).await {
            Ok(handled) => handled,
            Err(e) => {
                self.fail(e).await;
                true
            }
        };
        self.check_finished().await;
        handled
    }

    /// Supersede: erase the dialog without firing the completion callback.
    pub async fn abort(&mut self) {
        self.notified = true;
        self.flow.tracker_mut().cleanup().await;
    }

    async fn fail(&mut self, error: FlowError) {
        tracing::error!(flow = self.flow.id().as_str(), error = %error, "flow terminated by fault");
        let _ = self.flow.tracker_mut().notify(GENERIC_ERROR_TEXT).await;
        self.flow.terminate();
    }

    async fn check_finished(&mut self) {
        if self.flow.is_finished() && !self.notified {
            self.notified = true;
            self.flow.tracker_mut().cleanup().await;
            if let Some(callback) = &self.on_complete {
                callback(self.flow.id(), self.flow.succeeded());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_token_round_trip() {
        for action in [
            Action::Accept,
            Action::Cancel,
            Action::Percent(25),
            Action::Percent(100),
            Action::Amount(dec!(0.5)),
        ] {
            assert_eq!(Action::parse(&action.token()), Some(action));
        }
        assert_eq!(Action::parse("unknown"), None);
        assert_eq!(Action::parse("percent:lots"), None);
    }

    #[test]
    fn test_template_action_token_round_trip() {
        for action in [
            TemplateAction::Sell("WIF".into()),
            TemplateAction::Withdraw("SOL".into()),
        ] {
            assert_eq!(TemplateAction::parse(&action.token()), Some(action));
        }
        assert_eq!(TemplateAction::parse("sell"), None);
    }

    #[test]
    fn test_router_error_descriptions() {
        assert!(describe_swap_error(&RouterError::SlippageExhausted).is_some());
        assert!(describe_swap_error(&RouterError::NoRoute).is_some());
        assert!(describe_swap_error(&RouterError::MixedClassPair).is_some());
        // internal faults have no user-facing description
        assert!(describe_swap_error(&RouterError::Balance(
            crate::ports::chain::ChainError::Network("down".into())
        ))
        .is_none());
    }
}

//! Console chat transport
//!
//! Stand-in transport for the `run` command: prompts print to stdout with
//! their button tokens, deletes are logged instead of erasing anything.
//! Message ids are a process-local counter.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::ports::chat::{Button, ChatError, ChatPort, MessageId, UserId};

#[derive(Default)]
pub struct ConsoleChat {
    next_id: AtomicI64,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatPort for ConsoleChat {
    async fn send_message(
        &self,
        user: UserId,
        text: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageId, ChatError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{user}] {text}");
        for row in buttons {
            let rendered: Vec<String> = row
                .iter()
                .map(|b| format!("[{} -> {}]", b.label, b.action))
                .collect();
            println!("[{user}]   {}", rendered.join(" "));
        }
        Ok(id)
    }

    async fn delete_message(&self, user: UserId, message: MessageId) -> Result<(), ChatError> {
        tracing::debug!(user, message, "console transport: delete is a no-op");
        Ok(())
    }
}

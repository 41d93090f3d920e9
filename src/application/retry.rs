//! Bounded retry with backoff
//!
//! Two flavors wrap every outbound call in the engine: `run_network` retries
//! only faults the error type classifies as transient (timeouts, connection
//! loss), `run_all` retries unconditionally and backs best-effort cleanup
//! like message deletion. The delay grows linearly with the attempt number.

use std::future::Future;
use std::time::Duration;

use crate::ports::chain::ChainError;
use crate::ports::chat::ChatError;
use crate::ports::store::StoreError;
use crate::ports::venue::VenueError;

/// Classifies an error as worth retrying on the network-only path.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for VenueError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Transient for ChatError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Transient for ChainError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Retry transient faults only; anything else surfaces immediately.
    pub async fn run_network<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_inner(&mut op, true).await
    }

    /// Retry every failure up to the attempt budget.
    pub async fn run_all<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_inner(&mut op, false).await
    }

    async fn run_inner<T, E, F, Fut>(&self, op: &mut F, only_transient: bool) -> Result<T, E>
    where
        E: Transient + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if (only_transient && !e.is_transient()) || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tracing::debug!(attempt, max = self.max_attempts, error = %e, "retrying");
                    tokio::time::sleep(self.base_delay * attempt).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_transient_faults_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, VenueError> = quick()
            .run_network(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(VenueError::Network("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fault_surfaces_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, VenueError> = quick()
            .run_network(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(VenueError::ExecutionFailed("rejected".into()))
            })
            .await;

        assert!(matches!(result, Err(VenueError::ExecutionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, VenueError> = quick()
            .run_network(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(VenueError::Network("down".into()))
            })
            .await;

        assert!(matches!(result, Err(VenueError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_run_all_retries_any_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, ChatError> = quick()
            .run_all(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 1 {
                    Err(ChatError::Rejected("message already gone".into()))
                } else {
                    Ok(1)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

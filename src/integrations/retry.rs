//! Fixed-delay retry for GraphQL calls
//!
//! Every GraphQL operation is wrapped in [`with_retry`]: a bounded number of
//! attempts spaced by a constant delay. The delay is the same before every
//! retry; there is no exponential growth and no jitter.
//!
//! The pause goes through the [`Sleeper`] trait so a shutdown signal can cut
//! it short and tests can observe it without waiting.

use super::transport::TransportError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default number of attempts (including the first)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Pause between a failed attempt and the next one
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Terminal outcome of a retried operation
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// The sleep was interrupted before the full delay elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepCancelled;

/// Pause primitive used between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration) -> Result<(), SleepCancelled>;
}

/// tokio timer, optionally cut short by a shutdown signal
///
/// The sleep is cancelled once the watched value becomes `true`.
#[derive(Debug, Clone, Default)]
pub struct TokioSleeper {
    shutdown: Option<watch::Receiver<bool>>,
}

impl TokioSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) -> Result<(), SleepCancelled> {
        let Some(shutdown) = &self.shutdown else {
            sleep(duration).await;
            return Ok(());
        };

        let mut shutdown = shutdown.clone();
        if *shutdown.borrow() {
            return Err(SleepCancelled);
        }

        tokio::select! {
            _ = sleep(duration) => Ok(()),
            _ = shutdown.wait_for(|stop| *stop) => Err(SleepCancelled),
        }
    }
}

/// Execute an async operation with fixed-delay retry
///
/// # Arguments
/// * `config` - Attempt bound and delay
/// * `sleeper` - Pause primitive used between attempts
/// * `target` - Endpoint name for diagnostics
/// * `operation` - The async operation to execute
///
/// # Returns
/// The first successful result, or the last transport error once
/// `config.max_attempts` attempts have failed.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    sleeper: &dyn Sleeper,
    target: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;

    while attempt < config.max_attempts {
        attempt += 1;
        if attempt > 1 {
            warn!(
                attempt = attempt,
                max_attempts = config.max_attempts,
                endpoint = target,
                "Attempt {} to fetch data from {}",
                attempt,
                target
            );
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                crate::metrics::record_graphql_failure();

                if attempt >= config.max_attempts {
                    warn!(
                        endpoint = target,
                        attempts = attempt,
                        "Request failed after {} attempts: {}",
                        attempt,
                        e
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }

                debug!(
                    endpoint = target,
                    attempt = attempt,
                    delay_ms = config.delay.as_millis() as u64,
                    "Attempt failed, retrying: {}",
                    e
                );
                crate::metrics::record_retry();

                if sleeper.sleep(config.delay).await.is_err() {
                    warn!(endpoint = target, attempts = attempt, "Retry cancelled by shutdown");
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
            }
        }
    }

    // Only reachable with max_attempts == 0: report a failure, never a silent success
    Err(RetryError::Exhausted {
        attempts: attempt,
        source: TransportError::network(format!("no attempt made against {}", target)),
    })
}

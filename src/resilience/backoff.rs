//! Backoff between retries against the primary.

use std::time::Duration;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::BackoffConfig;
use crate::error::{Error, Result};

/// Delays to wait before each retry. The number of retries after the first
/// attempt is the number of delays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
}

impl BackoffPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// `retries` delays starting at `initial`, each the square of the
    /// previous one in seconds (2s, 4s, 16s, ...).
    pub fn squared(initial: Duration, retries: usize) -> Self {
        let mut secs = initial.as_secs().max(1);
        let mut delays = Vec::with_capacity(retries);
        for _ in 0..retries {
            delays.push(Duration::from_secs(secs));
            secs = secs.saturating_mul(secs);
        }
        Self { delays }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn retries(&self) -> usize {
        self.delays.len()
    }

    /// Delay before retry number `retry` (zero based), if one is allowed.
    pub fn delay(&self, retry: usize) -> Option<Duration> {
        self.delays.get(retry).copied()
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::squared(Duration::from_secs(2), 3)
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(config.delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }
}

/// Blocks the calling task between retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleep for `duration` unless `cancel` fires first.
pub async fn sleep_or_cancel(
    sleeper: &dyn Sleeper,
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = sleeper.sleep(duration) => Ok(()),
    }
}

//! Caller-side retry around [`TransferSession`].
//!
//! Sessions never retry on their own. Each attempt here opens a brand new
//! session, since a Failed session cannot be reused.

use crate::common::config::TransferConfig;
use crate::common::errors::{Result, TransferError};
use crate::transfer::session::{Ack, TransferSession};
use rand::Rng;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Extra random delay, as a fraction of the backoff (0.0 - 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Backoff after failed attempt number `attempt` (1-indexed), before jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()))
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=jitter);
        base + base.mul_f64(extra)
    }
}

/// Send `path`, opening a fresh session for each attempt.
///
/// Only errors where [`TransferError::is_retryable`] holds are retried.
pub async fn send_with_retry(
    path: &Path,
    config: &TransferConfig,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Ack> {
    let mut attempt: u32 = 1;

    loop {
        let result = send_once(path, config, cancel).await;

        match result {
            Ok(ack) => return Ok(ack),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transfer failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn send_once(path: &Path, config: &TransferConfig, cancel: &CancellationToken) -> Result<Ack> {
    let mut session = TransferSession::new(config.clone());

    tokio::select! {
        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
        connected = session.connect() => connected?,
    }

    let result = session.send(path, cancel).await;
    session.close().await;
    result
}

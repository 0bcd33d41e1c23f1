//! Retry with exponential backoff for the HTTP transport.
//!
//! Only [`HttpTransport`](super::HttpTransport) retries, and only on
//! non-streaming calls. Rate limits, 5xx gateway errors and network
//! failures are transient; every other status is returned at once.

use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries, just fail immediately).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Backoff multiplier (typically 2.0 for exponential backoff).
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if !self.jitter {
            return Duration::from_secs_f64(capped);
        }
        // Fixed jitter cycle; no rand dependency.
        let factor = [0.75, 0.90, 0.60, 0.85][(attempt % 4) as usize];
        Duration::from_secs_f64(capped * factor)
    }
}

/// Whether a transport failure is worth retrying.
pub fn is_transient(error: &TransportError) -> bool {
    match error {
        TransportError::Http { status, .. } => TRANSIENT_STATUSES.contains(status),
        TransportError::Request(message) => {
            let lower = message.to_lowercase();
            [
                "connection reset",
                "connection refused",
                "connection closed",
                "timed out",
                "timeout",
                "broken pipe",
            ]
            .iter()
            .any(|p| lower.contains(p))
        }
        TransportError::Other(_) => false,
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_retries && is_transient(&err) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "transient transport error (attempt {}/{}), retrying in {:?}: {err}",
                    attempt + 1,
                    config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

use std::{future::Future, time::Duration};

use log::*;
use rand::Rng;
use tokio::time::sleep;

use crate::PartnerConnectError;

/// Bounded exponential back-off for outbound platform calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)` plus up to half a base delay of jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let max_jitter = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if max_jitter > 0 { rand::thread_rng().gen_range(0..=max_jitter) } else { 0 };
        exp + Duration::from_millis(jitter)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, PartnerConnectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PartnerConnectError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!("🏦️ {label} failed ({e}). Retry {attempt}/{} in {delay:?}", self.max_retries);
                    sleep(delay).await;
                },
                Err(e) => return Err(e),
            }
        }
    }
}

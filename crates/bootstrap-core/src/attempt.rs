//! Bounded retry policy.
//!
//! A [`Strategy`] keeps retrying while fewer than `min` attempts were made
//! OR less than `total` has elapsed, sleeping `delay` between attempts. Both
//! bounds must be exhausted before it gives up, so a slow first attempt
//! still gets its minimum number of retries.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub min: u32,
    pub total: Duration,
    pub delay: Duration,
}

impl Strategy {
    /// Run `f` until it succeeds or the strategy is exhausted, returning the
    /// last error in the latter case.
    pub async fn run<T, E, F, Fut>(&self, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempts >= self.min && start.elapsed() >= self.total {
                        return Err(e);
                    }
                    debug!(attempt = attempts, error = %e, "attempt failed, retrying");
                }
            }
            tokio::time::sleep(self.delay).await;
        }
    }
}

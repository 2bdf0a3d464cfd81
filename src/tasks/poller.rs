use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::CatalogSnapshot;
use crate::config::FeedConfig;
use crate::error::PollError;
use crate::sources::CatalogSource;

/// Bounded exponential backoff between catalog fetch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure (1-based): factor^attempt seconds.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs(u64::from(self.backoff_factor).saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2,
        }
    }
}

impl From<&FeedConfig> for RetryPolicy {
    fn from(cfg: &FeedConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_factor: cfg.backoff_factor,
        }
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    /// The newest item differs from the last committed catalog.
    Changed(CatalogSnapshot),
    Unchanged,
    Failed(PollError),
}

/// Fetches the catalog with retries and fingerprints it against the last
/// committed identifier.
///
/// The identifier only moves on [`FeedPoller::commit`], which the slideshow
/// calls once the catalog has been materialized. Failed polls never touch it.
pub struct FeedPoller<C> {
    source: C,
    retry: RetryPolicy,
    last_identifier: Option<String>,
}

impl<C: CatalogSource> FeedPoller<C> {
    pub fn new(source: C, retry: RetryPolicy) -> Self {
        Self {
            source,
            retry,
            last_identifier: None,
        }
    }

    pub fn last_identifier(&self) -> Option<&str> {
        self.last_identifier.as_deref()
    }

    /// Fetches a snapshot, retrying every failure up to the policy's limit.
    pub async fn poll(&self, cancel: &CancellationToken) -> Result<CatalogSnapshot, PollError> {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            attempt += 1;
            let err = match self.source.fetch_catalog().await {
                Ok(items) => {
                    return CatalogSnapshot::new(items).ok_or(PollError::EmptyCatalog);
                }
                Err(err) => err,
            };
            warn!(
                attempt,
                max_attempts = self.retry.max_attempts,
                error = %err,
                "catalog fetch failed"
            );
            if attempt >= self.retry.max_attempts {
                warn!("max retries reached; catalog unavailable");
                return Err(PollError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            let wait = self.retry.delay_after(attempt);
            info!(wait_secs = wait.as_secs(), "retrying catalog fetch");
            tokio::select! {
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = sleep(wait) => {}
            }
        }
    }

    /// True when `snapshot` differs from the last committed identifier.
    pub fn is_new(&self, snapshot: &CatalogSnapshot) -> bool {
        self.last_identifier.as_deref() != Some(snapshot.identifier())
    }

    pub async fn check(&self, cancel: &CancellationToken) -> PollOutcome {
        match self.poll(cancel).await {
            Ok(snapshot) if self.is_new(&snapshot) => {
                info!(
                    identifier = snapshot.identifier(),
                    items = snapshot.len(),
                    "new images found"
                );
                PollOutcome::Changed(snapshot)
            }
            Ok(snapshot) => {
                debug!(identifier = snapshot.identifier(), "no new images");
                PollOutcome::Unchanged
            }
            Err(err) => PollOutcome::Failed(err),
        }
    }

    /// Records `snapshot` as the catalog currently on display.
    pub fn commit(&mut self, snapshot: &CatalogSnapshot) {
        self.last_identifier = Some(snapshot.identifier().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=3).map(|n| policy.delay_after(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8]);
    }

    #[test]
    fn policy_from_config_keeps_at_least_one_attempt() {
        let cfg = FeedConfig {
            max_attempts: 0,
            backoff_factor: 3,
            ..FeedConfig::default()
        };
        let policy = RetryPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(2), Duration::from_secs(9));
    }
}

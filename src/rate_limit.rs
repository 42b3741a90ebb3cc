//! Per-client request accounting.
//!
//! Fixed windows: the first request from a key opens a window of
//! `window` length, every later request inside it shares the same reset
//! instant. The in-memory limiter keeps state per process; use
//! [`crate::shared_store::SharedStoreRateLimiter`] when several instances
//! must share one budget.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::RateLimitError;
use crate::metrics::RATE_LIMIT_KEYS;

/// Outcome of one `check_and_consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Denied { retry_after: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Read, check and increment the counter for `client_key` as one step.
    async fn check_and_consume(&self, client_key: &str) -> Result<RateDecision, RateLimitError>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

// Rate limit entry - tracks requests per client key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: Instant,
}

impl RateLimitRecord {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.window_reset_at
    }
}

pub struct InMemoryRateLimiter {
    records: DashMap<String, RateLimitRecord>,
    max_requests: u32,
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn check(&self, client_key: &str) -> RateDecision {
        let now = Instant::now();

        // entry() holds the shard lock until the guard drops
        let mut record = self
            .records
            .entry(client_key.to_string())
            .or_insert(RateLimitRecord {
                count: 0,
                window_reset_at: now + self.window,
            });

        if record.is_expired(now) {
            record.count = 0;
            record.window_reset_at = now + self.window;
        }

        if record.count < self.max_requests {
            record.count += 1;
            return RateDecision::Allowed {
                remaining: self.max_requests - record.count,
            };
        }

        RateDecision::Denied {
            retry_after: retry_after_secs(record.window_reset_at - now),
        }
    }

    /// Current record for `client_key`, expired records read as absent.
    pub fn record(&self, client_key: &str) -> Option<RateLimitRecord> {
        let now = Instant::now();
        self.records
            .get(client_key)
            .map(|r| *r)
            .filter(|r| !r.is_expired(now))
    }

    /// Drop every expired record, returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.records.len());
        RATE_LIMIT_KEYS.set(self.records.len() as f64);
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_consume(&self, client_key: &str) -> Result<RateDecision, RateLimitError> {
        Ok(self.check(client_key))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Whole seconds until reset, rounded up and never zero.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

// Sweeper - drops expired records on a fixed interval
pub async fn sweeper(limiter: Arc<InMemoryRateLimiter>, every: Duration) {
    let mut interval = interval(every);

    loop {
        interval.tick().await;
        let removed = limiter.sweep_expired();
        if removed > 0 {
            debug!(removed, remaining = limiter.tracked_keys(), "swept expired rate-limit records");
        }
    }
}

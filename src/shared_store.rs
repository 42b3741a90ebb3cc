//! Rate limiting against an external Redis-compatible REST store.
//!
//! Each check is one pipeline: `INCR key`, `EXPIRE key window NX`,
//! `PTTL key`. INCR is atomic in the store, so every instance that points
//! at the same store shares one budget per client key. Counts keep rising
//! past the limit while a window is open; that only affects the store.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;

use crate::error::RateLimitError;
use crate::rate_limit::{RateDecision, RateLimiter, retry_after_secs};

const KEY_PREFIX: &str = "codegen:ratelimit";

pub struct SharedStoreRateLimiter {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    max_requests: u32,
    window: Duration,
}

// One entry of a pipeline reply: either {"result": ..} or {"error": ".."}
#[derive(Debug, Deserialize)]
pub struct PipelineReply {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl SharedStoreRateLimiter {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        token: Option<String>,
        max_requests: u32,
        window: Duration,
    ) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
            max_requests,
            window,
        }
    }

    fn key(client_key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, client_key)
    }

    fn pipeline(&self, key: &str) -> Value {
        let window_secs = self.window.as_secs().max(1);
        json!([
            ["INCR", key],
            ["EXPIRE", key, window_secs.to_string(), "NX"],
            ["PTTL", key],
        ])
    }
}

/// Turn the INCR/EXPIRE/PTTL replies into a decision.
pub fn decision_from_replies(
    replies: &[PipelineReply],
    max_requests: u32,
    window: Duration,
) -> Result<RateDecision, RateLimitError> {
    if let Some(err) = replies.iter().find_map(|r| r.error.as_deref()) {
        return Err(RateLimitError::Store(err.to_string()));
    }

    let (count, pttl) = match replies {
        [incr, _, pttl] => (incr.result.as_i64(), pttl.result.as_i64()),
        _ => {
            return Err(RateLimitError::Store(format!(
                "expected 3 pipeline replies, got {}",
                replies.len()
            )));
        }
    };

    let count = count
        .ok_or_else(|| RateLimitError::Store("INCR reply was not an integer".to_string()))?;

    if count <= i64::from(max_requests) {
        let remaining = (i64::from(max_requests) - count).max(0) as u32;
        return Ok(RateDecision::Allowed { remaining });
    }

    // -1/-2 mean no expiry or no key; fall back to a full window
    let remaining = match pttl {
        Some(ms) if ms > 0 => Duration::from_millis(ms as u64),
        _ => window,
    };

    Ok(RateDecision::Denied {
        retry_after: retry_after_secs(remaining),
    })
}

#[async_trait]
impl RateLimiter for SharedStoreRateLimiter {
    async fn check_and_consume(&self, client_key: &str) -> Result<RateDecision, RateLimitError> {
        let key = Self::key(client_key);

        let mut request = self
            .client
            .post(format!("{}/pipeline", self.url))
            .json(&self.pipeline(&key));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body = %body, "rate-limit store rejected pipeline");
            return Err(RateLimitError::Store(format!("store returned {}", status)));
        }

        let replies: Vec<PipelineReply> = res.json().await?;
        decision_from_replies(&replies, self.max_requests, self.window)
    }

    fn backend(&self) -> &'static str {
        "shared-store"
    }
}

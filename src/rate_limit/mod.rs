// Sliding-window and fixed-window rate limiters (spec.md §4.11).

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::get_config;
use crate::errors::Result;
use crate::table::rate_limits;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Write,
    PodCreate,
    StreamCreate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::PodCreate => "pod_create",
            Action::StreamCreate => "stream_create",
        }
    }

    fn limit(&self) -> u32 {
        let cfg = get_config();
        match self {
            Action::Read => cfg.rate_limit_reads,
            Action::Write => cfg.rate_limit_writes,
            Action::PodCreate => cfg.rate_limit_pod_create,
            Action::StreamCreate => cfg.rate_limit_stream_create,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: i64,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_and_increment(&self, identifier: &str, action: Action) -> Result<Decision>;
}

/// In-memory adapter: a trimmed list of request timestamps per
/// `(identifier, action)`, as spec.md §4.11 describes.
#[derive(Default)]
pub struct SlidingWindowLimiter {
    buckets: DashMap<(String, &'static str), Vec<i64>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cleanup(&self) {
        let window = get_config().rate_limit_window_ms;
        let cutoff = now_ms() - window;
        self.buckets.retain(|_, entries| {
            entries.retain(|ts| *ts >= cutoff);
            !entries.is_empty()
        });
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check_and_increment(&self, identifier: &str, action: Action) -> Result<Decision> {
        let window = get_config().rate_limit_window_ms;
        let limit = action.limit();
        let now = now_ms();
        let cutoff = now - window;
        let key = (identifier.to_string(), action.as_str());

        let mut entry = self.buckets.entry(key).or_default();
        entry.retain(|ts| *ts >= cutoff);
        let count = entry.len() as u32;
        let reset_at = entry.first().copied().unwrap_or(now) + window;

        if count >= limit {
            return Ok(Decision {
                allowed: false,
                remaining: 0,
                limit,
                reset_at,
            });
        }
        entry.push(now);
        Ok(Decision {
            allowed: true,
            remaining: limit - count - 1,
            limit,
            reset_at: now + window,
        })
    }
}

/// Postgres-backed adapter: a single row per `(identifier, action,
/// window_start)` bucket, boundaries at `floor(now/window)*window`
/// (spec.md §4.11).
pub struct FixedWindowLimiter;

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check_and_increment(&self, identifier: &str, action: Action) -> Result<Decision> {
        let window = get_config().rate_limit_window_ms;
        let limit = action.limit();
        let now = now_ms();
        let window_start = (now / window) * window;
        let window_end = window_start + window;

        let existing = rate_limits::get(identifier, action.as_str(), window_start).await?;
        let current_count = existing.map(|b| b.count).unwrap_or(0);

        if current_count >= limit as i64 {
            return Ok(Decision {
                allowed: false,
                remaining: 0,
                limit,
                reset_at: window_end,
            });
        }

        let new_count =
            rate_limits::increment(identifier, action.as_str(), window_start, window_end).await?;
        Ok(Decision {
            allowed: true,
            remaining: (limit as i64 - new_count).max(0) as u32,
            limit,
            reset_at: window_end,
        })
    }
}

pub async fn cleanup_fixed_window() -> Result<u64> {
    let cutoff = now_ms();
    rate_limits::cleanup_older_than(cutoff).await
}

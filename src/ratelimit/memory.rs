use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::{RateLimitDecision, RateLimitRule, RateLimitStore};

struct Window {
    start: i64,
    count: u32,
}

/// Single-instance fixed-window limiter. One mutex guards the whole map, so
/// increment-and-compare is atomic per key.
#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn check_at(&self, key: &str, rule: RateLimitRule, now: i64) -> RateLimitDecision {
        let mut windows = self.windows.lock().await;
        let entry = windows
            .entry(key.to_string())
            .or_insert(Window { start: now, count: 0 });

        if now >= entry.start + rule.window_secs {
            entry.start = now;
            entry.count = 0;
        }

        let reset_at = entry.start + rule.window_secs;
        if entry.count >= rule.limit {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: rule.limit - entry.count,
            reset_at,
        }
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn check(&self, key: &str, rule: RateLimitRule) -> RateLimitDecision {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.check_at(key, rule, now).await
    }
}

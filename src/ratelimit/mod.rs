mod memory;
mod postgres;

pub use memory::InMemoryRateLimiter;
pub use postgres::PgRateLimiter;

use async_trait::async_trait;

/// Fixed-window rule for one feature.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_secs: i64,
}

/// Result of one admission check. `reset_at` is a unix timestamp and is the
/// same for every caller sharing the key within the current window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: i64,
}

/// Admission-control counter store, keyed by identity + feature.
///
/// Implementations must make increment-and-compare atomic per key: two
/// concurrent requests must not both be admitted when one slot remains.
/// A broken backing store is a deployment problem, not a per-request error,
/// so `check` never fails; implementations log and fail open instead.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, key: &str, rule: RateLimitRule) -> RateLimitDecision;
}

/// Key for the meal-scan feature gate.
pub fn scan_key(user_id: uuid::Uuid) -> String {
    format!("meal-scan:{}", user_id)
}

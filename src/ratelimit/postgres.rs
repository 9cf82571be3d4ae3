use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::warn;

use super::{RateLimitDecision, RateLimitRule, RateLimitStore};

/// Shared fixed-window limiter for multi-instance deployments. The whole
/// increment-and-compare runs as a single upsert, so concurrent instances
/// observe one consistent counter per key.
pub struct PgRateLimiter {
    db: PgPool,
}

impl PgRateLimiter {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimiter {
    async fn check(&self, key: &str, rule: RateLimitRule) -> RateLimitDecision {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let expired_before = now - rule.window_secs;

        let row = sqlx::query_as::<_, (i64, i64)>(
            r#"
            INSERT INTO rate_limits (key, window_start, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (key) DO UPDATE SET
                count = CASE
                    WHEN rate_limits.window_start <= $3 THEN 1
                    ELSE rate_limits.count + 1
                END,
                window_start = CASE
                    WHEN rate_limits.window_start <= $3 THEN $2
                    ELSE rate_limits.window_start
                END
            RETURNING window_start, count
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(expired_before)
        .fetch_one(&self.db)
        .await;

        match row {
            Ok((window_start, count)) => {
                let limit = rule.limit as i64;
                RateLimitDecision {
                    allowed: count <= limit,
                    remaining: limit.saturating_sub(count).max(0) as u32,
                    reset_at: window_start + rule.window_secs,
                }
            }
            Err(e) => {
                // The store being down is a deployment problem; admitting the
                // request is the lesser harm here.
                warn!(error = %e, key, "rate limit store unavailable, failing open");
                RateLimitDecision {
                    allowed: true,
                    remaining: 0,
                    reset_at: now + rule.window_secs,
                }
            }
        }
    }
}

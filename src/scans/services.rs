use tracing::{info, warn};
use uuid::Uuid;

use crate::providers::{AnalysisOutcome, DetectedFoodItem};
use crate::ratelimit::{scan_key, RateLimitRule};
use crate::state::AppState;

use super::image::{validate_image, ImageError};
use super::repo::NewMealScan;

/// Final state of one analysis request, ready for response composition.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed {
        foods: Vec<DetectedFoodItem>,
        scan_id: Option<Uuid>,
        remaining: u32,
    },
    GateLimited {
        reset_at: i64,
    },
    InvalidImage(ImageError),
    /// Every provider was tried and the last one was rate-limited.
    ProvidersRateLimited,
    /// Every provider was tried and the last one failed outright.
    ProvidersFailed,
}

/// Drive the full pipeline: admission gate, payload validation, then the
/// provider chain in strict priority order with one attempt each. Providers
/// run sequentially so a successful early attempt never spends quota on a
/// later one. Persistence is best-effort and only runs after a success.
pub async fn analyze_meal(state: &AppState, user_id: Uuid, raw_image: &str) -> ScanOutcome {
    let rule = RateLimitRule {
        limit: state.config.scan.rate_limit,
        window_secs: state.config.scan.rate_window_secs,
    };
    let decision = state.limiter.check(&scan_key(user_id), rule).await;
    if !decision.allowed {
        info!(%user_id, reset_at = decision.reset_at, "meal scan gate denied");
        return ScanOutcome::GateLimited {
            reset_at: decision.reset_at,
        };
    }

    let image = match validate_image(raw_image, state.config.scan.max_image_bytes) {
        Ok(image) => image,
        Err(e) => {
            warn!(%user_id, error = %e, "image rejected before any provider call");
            return ScanOutcome::InvalidImage(e);
        }
    };

    let mut last_was_rate_limit = false;
    for provider in state.providers.iter() {
        match provider.analyze(&image).await {
            AnalysisOutcome::Success(foods) => {
                let scan_id = persist_scan(state, user_id, &image, &foods).await;
                info!(
                    %user_id,
                    provider = provider.name(),
                    items = foods.len(),
                    scan_id = ?scan_id,
                    "meal analysis succeeded"
                );
                return ScanOutcome::Completed {
                    foods,
                    scan_id,
                    remaining: decision.remaining,
                };
            }
            AnalysisOutcome::RateLimited => {
                warn!(%user_id, provider = provider.name(), "provider rate limited, moving on");
                last_was_rate_limit = true;
            }
            AnalysisOutcome::Failure(reason) => {
                warn!(%user_id, provider = provider.name(), reason, "provider failed, moving on");
                last_was_rate_limit = false;
            }
        }
    }

    if last_was_rate_limit {
        ScanOutcome::ProvidersRateLimited
    } else {
        ScanOutcome::ProvidersFailed
    }
}

/// A storage hiccup must never turn a successful analysis into a
/// client-visible error, so errors are logged and collapsed to `None`.
async fn persist_scan(
    state: &AppState,
    user_id: Uuid,
    image: &str,
    foods: &[DetectedFoodItem],
) -> Option<Uuid> {
    let scan = NewMealScan::from_items(user_id, image, foods.to_vec());
    match state.scans.insert_scan(&scan).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(%user_id, error = %e, "failed to persist meal scan, continuing");
            None
        }
    }
}

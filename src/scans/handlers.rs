use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::auth::AuthUser;
use crate::state::AppState;

use super::dto::{AnalyzeMealRequest, AnalyzeMealResponse, ErrorBody, Pagination, ScanListItem};
use super::services::{self, ScanOutcome};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-meal", post(analyze_meal))
        .route("/meal-scans", get(list_scans))
}

/// POST /analyze-meal { "image": "<base64 or data-url>" }
#[instrument(skip(state, body))]
pub async fn analyze_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AnalyzeMealRequest>,
) -> Response {
    match services::analyze_meal(&state, user_id, &body.image).await {
        ScanOutcome::Completed {
            foods,
            scan_id,
            remaining,
        } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                "X-RateLimit-Remaining",
                remaining.to_string().parse().unwrap(),
            );
            (
                StatusCode::OK,
                headers,
                Json(AnalyzeMealResponse { foods, scan_id }),
            )
                .into_response()
        }
        ScanOutcome::GateLimited { reset_at } => {
            let mut headers = HeaderMap::new();
            headers.insert("X-RateLimit-Remaining", "0".parse().unwrap());
            headers.insert("X-RateLimit-Reset", reset_at.to_string().parse().unwrap());
            (
                StatusCode::TOO_MANY_REQUESTS,
                headers,
                Json(ErrorBody::with_fallback(
                    "Too many meal scans. Try again later or log your meal manually.",
                )),
            )
                .into_response()
        }
        ScanOutcome::InvalidImage(e) => {
            (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response()
        }
        ScanOutcome::ProvidersRateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::with_fallback(
                "AI services are busy. Please try again shortly or search for foods manually.",
            )),
        )
            .into_response(),
        ScanOutcome::ProvidersFailed => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::with_fallback(
                "Could not analyze the meal. Please try searching for foods manually.",
            )),
        )
            .into_response(),
    }
}

/// GET /meal-scans: scan history for the requesting user, newest first.
#[instrument(skip(state))]
pub async fn list_scans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ScanListItem>>, (StatusCode, Json<ErrorBody>)> {
    let scans = state
        .scans
        .list_scans(user_id, p.limit, p.offset)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "list_scans failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("Internal server error")),
            )
        })?;

    let items = scans
        .into_iter()
        .map(|s| ScanListItem {
            id: s.id,
            meal_name: s.meal_name,
            total_calories: s.total_calories,
            foods: s.detected_foods,
            scan_date: s.scan_date,
        })
        .collect();
    Ok(Json(items))
}

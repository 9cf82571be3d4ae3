use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SegmentationConfig;

use super::{clamp_confidence, sane_macro, AnalysisOutcome, DetectedFoodItem, VisionProvider};

/// Fallback adapter with a two-step protocol: submit the image for
/// segmentation, then look up nutrition for the returned image id. As the
/// last resort in the chain it degrades instead of failing: if the nutrition
/// step breaks, segmentation names with zero macros still go back to the user.
pub struct SegmentationProvider {
    client: Client,
    config: SegmentationConfig,
}

#[derive(Debug, Deserialize)]
struct SegmentationResponse {
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct NutritionResponse {
    #[serde(default)]
    items: Vec<NutritionInfo>,
}

#[derive(Debug, Deserialize)]
struct NutritionInfo {
    #[serde(default)]
    serving: Option<String>,
    #[serde(default)]
    calories: Option<f64>,
    #[serde(default)]
    protein: Option<f64>,
    #[serde(default)]
    carbs: Option<f64>,
    #[serde(default)]
    fat: Option<f64>,
}

impl SegmentationProvider {
    pub fn new(config: SegmentationConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    async fn segment(&self, image_b64: &str) -> Result<SegmentationResponse, AnalysisOutcome> {
        let url = format!("{}/segmentation", self.config.api_url.trim_end_matches('/'));
        debug!(%url, "submitting image for segmentation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "image": image_b64 }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(provider = "segmentation", "segmentation timed out");
                    AnalysisOutcome::Failure("segmentation timed out".into())
                } else {
                    warn!(provider = "segmentation", error = %e, "segmentation request failed");
                    AnalysisOutcome::Failure(format!("segmentation request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = "segmentation", "provider quota exhausted");
            return Err(AnalysisOutcome::RateLimited);
        }
        if !status.is_success() {
            warn!(provider = "segmentation", %status, "segmentation error status");
            return Err(AnalysisOutcome::Failure(format!(
                "segmentation api error: {}",
                status
            )));
        }

        response.json::<SegmentationResponse>().await.map_err(|e| {
            warn!(provider = "segmentation", error = %e, "unreadable segmentation response");
            AnalysisOutcome::Failure("unreadable segmentation response".into())
        })
    }

    /// Best-effort second step. Partial data beats no data, so any failure
    /// here collapses to an empty list rather than an error.
    async fn nutrition(&self, image_id: &str) -> Vec<NutritionInfo> {
        let url = format!("{}/nutrition", self.config.api_url.trim_end_matches('/'));
        debug!(%url, image_id, "looking up nutrition details");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({ "image_id": image_id }))
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(provider = "segmentation", status = %r.status(), "nutrition lookup failed");
                return Vec::new();
            }
            Err(e) => {
                warn!(provider = "segmentation", error = %e, "nutrition lookup failed");
                return Vec::new();
            }
        };

        match response.json::<NutritionResponse>().await {
            Ok(n) => n.items,
            Err(e) => {
                warn!(provider = "segmentation", error = %e, "unreadable nutrition response");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl VisionProvider for SegmentationProvider {
    fn name(&self) -> &'static str {
        "segmentation"
    }

    async fn analyze(&self, image_b64: &str) -> AnalysisOutcome {
        let segmentation = match self.segment(image_b64).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let segments: Vec<(String, f64)> = segmentation
            .segments
            .into_iter()
            .filter_map(|s| {
                let name = s.name?.trim().to_string();
                if name.is_empty() {
                    return None;
                }
                Some((name, clamp_confidence(s.confidence.unwrap_or(0.0))))
            })
            .collect();

        if segments.is_empty() {
            warn!(provider = "segmentation", "no recognizable segments");
            return AnalysisOutcome::Failure("no foods recognized in image".into());
        }

        let nutrition = match segmentation.image_id.as_deref() {
            Some(id) => self.nutrition(id).await,
            None => Vec::new(),
        };

        AnalysisOutcome::Success(zip_items(segments, nutrition))
    }
}

/// Pair segments with nutrition rows by position. The two lists come from
/// independent calls and may differ in length; an index past the nutrition
/// list means "nutrition unavailable for this item", not an error.
fn zip_items(segments: Vec<(String, f64)>, nutrition: Vec<NutritionInfo>) -> Vec<DetectedFoodItem> {
    segments
        .into_iter()
        .enumerate()
        .map(|(i, (name, confidence))| {
            let info = nutrition.get(i);
            DetectedFoodItem {
                name,
                portion: info
                    .and_then(|n| n.serving.clone())
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| "1 serving".into()),
                calories: sane_macro(info.and_then(|n| n.calories)),
                protein: sane_macro(info.and_then(|n| n.protein)),
                carbs: sane_macro(info.and_then(|n| n.carbs)),
                fat: sane_macro(info.and_then(|n| n.fat)),
                confidence,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmentation_response_tolerates_partial_json() {
        let parsed: SegmentationResponse =
            serde_json::from_str(r#"{"segments":[{"name":"Pizza"}]}"#).unwrap();
        assert!(parsed.image_id.is_none());
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.segments[0].name.as_deref(), Some("Pizza"));
        assert!(parsed.segments[0].confidence.is_none());
    }

    #[test]
    fn nutrition_response_tolerates_missing_fields() {
        let parsed: NutritionResponse =
            serde_json::from_str(r#"{"items":[{"calories":250}]}"#).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].calories, Some(250.0));
        assert!(parsed.items[0].serving.is_none());
    }

    #[test]
    fn zip_pairs_by_position() {
        let items = zip_items(
            vec![("Rice".into(), 0.8), ("Chicken".into(), 0.7)],
            vec![
                NutritionInfo {
                    serving: Some("1 cup".into()),
                    calories: Some(205.0),
                    protein: Some(4.0),
                    carbs: Some(45.0),
                    fat: Some(0.4),
                },
                NutritionInfo {
                    serving: None,
                    calories: Some(231.0),
                    protein: Some(43.0),
                    carbs: Some(0.0),
                    fat: Some(5.0),
                },
            ],
        );
        assert_eq!(items[0].portion, "1 cup");
        assert_eq!(items[0].calories, 205.0);
        assert_eq!(items[1].portion, "1 serving");
        assert_eq!(items[1].protein, 43.0);
    }

    #[test]
    fn zip_survives_shorter_nutrition_list() {
        let items = zip_items(
            vec![("Rice".into(), 0.8), ("Chicken".into(), 0.7)],
            vec![NutritionInfo {
                serving: None,
                calories: Some(205.0),
                protein: None,
                carbs: None,
                fat: None,
            }],
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].calories, 205.0);
        // Second segment has no nutrition row: zero macros, name kept.
        assert_eq!(items[1].name, "Chicken");
        assert_eq!(items[1].calories, 0.0);
        assert_eq!(items[1].fat, 0.0);
        assert_eq!(items[1].confidence, 0.7);
    }

    #[test]
    fn zip_with_no_nutrition_keeps_all_segments() {
        let items = zip_items(vec![("Toast".into(), 0.9)], Vec::new());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].calories, 0.0);
    }

    mod http {
        use axum::http::StatusCode as AxumStatus;
        use axum::{routing::post, Json, Router};

        use super::*;

        async fn spawn_stub(router: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });
            format!("http://{}", addr)
        }

        fn provider_for(api_url: String) -> SegmentationProvider {
            SegmentationProvider::new(SegmentationConfig {
                api_url,
                api_key: "test".into(),
                timeout_secs: 5,
            })
            .unwrap()
        }

        #[tokio::test]
        async fn full_pair_yields_items_with_macros() {
            let router = Router::new()
                .route(
                    "/segmentation",
                    post(|| async {
                        Json(json!({
                            "image_id": "img-1",
                            "segments": [
                                {"name": "Rice", "confidence": 0.8},
                                {"name": "Chicken", "confidence": 0.7}
                            ]
                        }))
                    }),
                )
                .route(
                    "/nutrition",
                    post(|| async {
                        Json(json!({
                            "items": [
                                {"serving": "1 cup", "calories": 205.0, "protein": 4.0,
                                 "carbs": 45.0, "fat": 0.4},
                                {"calories": 231.0, "protein": 43.0, "carbs": 0.0, "fat": 5.0}
                            ]
                        }))
                    }),
                );
            let provider = provider_for(spawn_stub(router).await);

            match provider.analyze("AAAA").await {
                AnalysisOutcome::Success(items) => {
                    assert_eq!(items.len(), 2);
                    assert_eq!(items[0].name, "Rice");
                    assert_eq!(items[0].calories, 205.0);
                    assert_eq!(items[1].protein, 43.0);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        #[tokio::test]
        async fn nutrition_failure_still_succeeds_with_zero_macros() {
            let router = Router::new()
                .route(
                    "/segmentation",
                    post(|| async {
                        Json(json!({
                            "image_id": "img-1",
                            "segments": [{"name": "Pizza", "confidence": 0.8}]
                        }))
                    }),
                )
                .route(
                    "/nutrition",
                    post(|| async {
                        (
                            AxumStatus::INTERNAL_SERVER_ERROR,
                            Json(json!({"error": "nutrition backend down"})),
                        )
                    }),
                );
            let provider = provider_for(spawn_stub(router).await);

            match provider.analyze("AAAA").await {
                AnalysisOutcome::Success(items) => {
                    assert_eq!(items.len(), 1);
                    assert_eq!(items[0].name, "Pizza");
                    assert_eq!(items[0].calories, 0.0);
                    assert_eq!(items[0].protein, 0.0);
                    assert_eq!(items[0].fat, 0.0);
                    assert_eq!(items[0].confidence, 0.8);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        #[tokio::test]
        async fn segmentation_quota_exhaustion_is_rate_limited() {
            let router = Router::new().route(
                "/segmentation",
                post(|| async {
                    (
                        AxumStatus::TOO_MANY_REQUESTS,
                        Json(json!({"error": "quota exceeded"})),
                    )
                }),
            );
            let provider = provider_for(spawn_stub(router).await);

            assert!(matches!(
                provider.analyze("AAAA").await,
                AnalysisOutcome::RateLimited
            ));
        }

        #[tokio::test]
        async fn segmentation_error_status_is_failure() {
            let router = Router::new().route(
                "/segmentation",
                post(|| async { (AxumStatus::BAD_GATEWAY, Json(json!({"error": "bad"}))) }),
            );
            let provider = provider_for(spawn_stub(router).await);

            assert!(matches!(
                provider.analyze("AAAA").await,
                AnalysisOutcome::Failure(_)
            ));
        }
    }
}

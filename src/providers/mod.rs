mod fallback;
pub mod parse;
mod primary;

pub use fallback::SegmentationProvider;
pub use primary::VisionLlmProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One normalized food guess. Values are sanitized before this type is
/// constructed, so downstream code may trust the ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFoodItem {
    pub name: String,
    pub portion: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub confidence: f64,
}

/// Loosely-typed item as a provider reports it. Providers are adversarial
/// input: any field may be missing, mistyped, or out of range.
#[derive(Debug, Default, Deserialize)]
pub struct RawFoodItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub portion: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl RawFoodItem {
    /// Shape-check one provider item. Items without a usable name are
    /// rejected; everything else is defaulted or clamped.
    pub fn normalize(self) -> Option<DetectedFoodItem> {
        let name = self.name?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(DetectedFoodItem {
            name,
            portion: self
                .portion
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| "1 serving".into()),
            calories: sane_macro(self.calories),
            protein: sane_macro(self.protein),
            carbs: sane_macro(self.carbs),
            fat: sane_macro(self.fat),
            confidence: clamp_confidence(self.confidence.unwrap_or(0.5)),
        })
    }
}

fn sane_macro(v: Option<f64>) -> f64 {
    match v {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Providers report whatever they like; confidence leaves the adapter
/// boundary inside [0, 1] no matter what.
pub fn clamp_confidence(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

/// Outcome of one provider attempt, classified at the adapter boundary.
/// Adapters never propagate errors past this type.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Success(Vec<DetectedFoodItem>),
    RateLimited,
    Failure(String),
}

/// One external vision/nutrition estimator. Implementations own their HTTP
/// client and timeout; the orchestrator only sees the outcome contract.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, image_b64: &str) -> AnalysisOutcome;
}

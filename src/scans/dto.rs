use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::providers::DetectedFoodItem;

#[derive(Debug, Deserialize)]
pub struct AnalyzeMealRequest {
    /// Raw base64 or a `data:<mime>;base64,<data>` URL.
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeMealResponse {
    pub foods: Vec<DetectedFoodItem>,
    #[serde(rename = "scanId", skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// Set when the client should offer manual food search instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fallback: Some(true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanListItem {
    pub id: Uuid,
    #[serde(rename = "mealName")]
    pub meal_name: String,
    #[serde(rename = "totalCalories")]
    pub total_calories: f64,
    pub foods: serde_json::Value,
    #[serde(rename = "scanDate", with = "time::serde::rfc3339")]
    pub scan_date: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

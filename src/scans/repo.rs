use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::providers::DetectedFoodItem;

/// Longest `image_ref` prefix worth keeping; the audit row references the
/// payload, it does not store it.
const IMAGE_REF_MAX: usize = 64;

/// Scan audit row as read back for history.
#[derive(Debug, Clone, FromRow)]
pub struct MealScan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_ref: String,
    pub detected_foods: serde_json::Value,
    pub total_calories: f64,
    pub meal_name: String,
    pub scan_date: OffsetDateTime,
}

/// Write model for one successful analysis. Built once, inserted once,
/// never mutated.
#[derive(Debug, Clone)]
pub struct NewMealScan {
    pub user_id: Uuid,
    pub image_ref: String,
    pub detected_foods: Vec<DetectedFoodItem>,
    pub total_calories: f64,
    pub meal_name: String,
}

impl NewMealScan {
    pub fn from_items(user_id: Uuid, image_ref: &str, items: Vec<DetectedFoodItem>) -> Self {
        let total_calories = items.iter().map(|i| i.calories).sum();
        let meal_name = match items.as_slice() {
            [] => "Meal scan".to_string(),
            [only] => only.name.clone(),
            [first, rest @ ..] => format!("{} + {} more", first.name, rest.len()),
        };
        Self {
            user_id,
            image_ref: image_ref.chars().take(IMAGE_REF_MAX).collect(),
            detected_foods: items,
            total_calories,
            meal_name,
        }
    }
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn insert_scan(&self, scan: &NewMealScan) -> anyhow::Result<Uuid>;

    async fn list_scans(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<MealScan>>;
}

pub struct PgScanStore {
    db: PgPool,
}

impl PgScanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScanStore for PgScanStore {
    async fn insert_scan(&self, scan: &NewMealScan) -> anyhow::Result<Uuid> {
        let foods = serde_json::to_value(&scan.detected_foods)?;
        let id: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO meal_scans (id, user_id, image_ref, detected_foods, total_calories, meal_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(scan.user_id)
        .bind(&scan.image_ref)
        .bind(foods)
        .bind(scan.total_calories)
        .bind(&scan.meal_name)
        .fetch_one(&self.db)
        .await?;
        Ok(id.0)
    }

    async fn list_scans(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<MealScan>> {
        let rows = sqlx::query_as::<_, MealScan>(
            r#"
            SELECT id, user_id, image_ref, detected_foods, total_calories, meal_name, scan_date
            FROM meal_scans
            WHERE user_id = $1
            ORDER BY scan_date DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

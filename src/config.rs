use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Primary provider: one multimodal chat-completion call.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionLlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Fallback provider: segmentation submit + nutrition lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub max_image_bytes: usize,
    pub rate_limit: u32,
    pub rate_window_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub vision: VisionLlmConfig,
    pub segmentation: SegmentationConfig,
    pub scan: ScanConfig,
    pub rate_limit_backend: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutriscan".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutriscan-users".into()),
        };
        let vision = VisionLlmConfig {
            api_url: std::env::var("VISION_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".into()),
            api_key: std::env::var("VISION_API_KEY")?,
            model: std::env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            timeout_secs: std::env::var("VISION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        };
        let segmentation = SegmentationConfig {
            api_url: std::env::var("SEGMENTATION_API_URL")?,
            api_key: std::env::var("SEGMENTATION_API_KEY")?,
            timeout_secs: std::env::var("SEGMENTATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(20),
        };
        let scan = ScanConfig {
            max_image_bytes: std::env::var("MAX_IMAGE_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(5 * 1024 * 1024),
            // Meal scans cost provider quota, so the gate is stricter than
            // anything else the API exposes.
            rate_limit: std::env::var("MEAL_SCAN_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            rate_window_secs: std::env::var("MEAL_SCAN_RATE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(3600),
        };
        let rate_limit_backend =
            std::env::var("RATE_LIMIT_BACKEND").unwrap_or_else(|_| "memory".into());

        Ok(Self {
            database_url,
            jwt,
            vision,
            segmentation,
            scan,
            rate_limit_backend,
        })
    }
}

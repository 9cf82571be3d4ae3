use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::VisionLlmConfig;

use super::parse::parse_provider_json;
use super::{AnalysisOutcome, VisionProvider};

const ANALYSIS_PROMPT: &str = "Analyze the meal in this photo. Respond with a single JSON object \
of the shape {\"foods\": [{\"name\": string, \"portion\": string, \"calories\": number, \
\"protein\": number, \"carbs\": number, \"fat\": number, \"confidence\": number between 0 and 1}]} \
listing every distinct food you can identify. Respond with JSON only, no commentary.";

/// Primary adapter: one multimodal chat-completion request. The reply is free
/// text that should contain a `{"foods": [...]}` object.
pub struct VisionLlmProvider {
    client: Client,
    config: VisionLlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl VisionLlmProvider {
    pub fn new(config: VisionLlmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn request_body(&self, image_b64: &str) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": ANALYSIS_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{}", image_b64) }
                    }
                ]
            }],
            "max_tokens": 800,
            "temperature": 0
        })
    }
}

#[async_trait]
impl VisionProvider for VisionLlmProvider {
    fn name(&self) -> &'static str {
        "vision-llm"
    }

    async fn analyze(&self, image_b64: &str) -> AnalysisOutcome {
        debug!(url = %self.config.api_url, "sending vision request");

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(image_b64))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(provider = self.name(), "request timed out");
                return AnalysisOutcome::Failure("vision request timed out".into());
            }
            Err(e) => {
                warn!(provider = self.name(), error = %e, "request failed");
                return AnalysisOutcome::Failure(format!("vision request failed: {}", e));
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = self.name(), "provider quota exhausted");
            return AnalysisOutcome::RateLimited;
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider = self.name(), %status, body, "provider returned error status");
            return AnalysisOutcome::Failure(format!("vision api error: {}", status));
        }

        let chat: ChatResponse = match response.json().await {
            Ok(c) => c,
            Err(e) => {
                warn!(provider = self.name(), error = %e, "unreadable response body");
                return AnalysisOutcome::Failure("unreadable vision response".into());
            }
        };

        let content = match chat.choices.into_iter().next().and_then(|c| c.message.content) {
            Some(c) => c,
            None => {
                warn!(provider = self.name(), "response has no content");
                return AnalysisOutcome::Failure("vision response has no content".into());
            }
        };

        match parse_provider_json(&content) {
            Ok(items) => AnalysisOutcome::Success(items),
            Err(e) => {
                warn!(provider = self.name(), error = %e, "could not extract food list");
                AnalysisOutcome::Failure(e.to_string())
            }
        }
    }
}

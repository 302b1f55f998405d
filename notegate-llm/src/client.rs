//! Upstream client: one `generateContent` call per invocation.
//!
//! The client never retries; rotation and retry belong to the orchestrator.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::UpstreamError;
use crate::tier::ModelHandle;
use crate::types::{GenerateRequest, Part};

/// Default Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Anything that can turn one bound request into text.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Perform exactly one upstream call.
    ///
    /// Empty text is a valid answer; the caller decides what to show instead.
    async fn generate(
        &self,
        model: &ModelHandle,
        request: &GenerateRequest,
    ) -> Result<String, UpstreamError>;
}

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl Provider for GeminiClient {
    async fn generate(
        &self,
        model: &ModelHandle,
        request: &GenerateRequest,
    ) -> Result<String, UpstreamError> {
        let body = build_body(model, request);
        let start = Instant::now();
        let resp = self
            .http
            .post(self.endpoint(model.model()))
            .header("x-goog-api-key", model.bound().credential.expose())
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(model = model.model(), status = status.as_u16(), latency_ms, "generateContent returned");

        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &text));
        }
        let json: Value =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Parse(e.to_string()))?;
        extract_text(&json)
    }
}

/// JSON body for `generateContent`.
#[must_use]
pub fn build_body(model: &ModelHandle, request: &GenerateRequest) -> Value {
    let params = model.params();
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::Inline(att) => json!({
                "inlineData": {
                    "mimeType": att.mime_type,
                    "data": BASE64.encode(&att.data),
                }
            }),
        })
        .collect();

    json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "temperature": params.temperature,
            "topP": params.top_p,
            "topK": params.top_k,
            "maxOutputTokens": params.max_output_tokens,
        }
    })
}

/// Concatenate the text parts of the first candidate.
///
/// # Errors
/// `UpstreamError::Parse` if there is no candidate at all. A prompt blocked by
/// the provider is reported with its block reason.
pub fn extract_text(json: &Value) -> Result<String, UpstreamError> {
    let Some(candidate) = json["candidates"].get(0) else {
        if let Some(reason) = json["promptFeedback"]["blockReason"].as_str() {
            return Err(UpstreamError::Parse(format!("prompt blocked: {reason}")));
        }
        return Err(UpstreamError::Parse("response has no candidates".into()));
    };

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();
    Ok(text)
}

/// Map an error body (`{"error": {code, message, status}}`) to [`UpstreamError::Http`].
#[must_use]
pub fn parse_error(status: u16, body: &str) -> UpstreamError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().map(|v| &v["error"]);
    let message = error
        .and_then(|e| e["message"].as_str())
        .map_or_else(|| body.trim().to_string(), str::to_string);
    let code = error
        .and_then(|e| e["status"].as_str())
        .map(str::to_string);
    UpstreamError::Http {
        status,
        code,
        message,
    }
}

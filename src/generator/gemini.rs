/// Gemini REST client implementing [`TextGenerator`].
///
/// Talks to the `models/{model}:generateContent` endpoint. List requests ask
/// for a JSON array response schema; chat requests pass the system
/// instruction and the alternating turn history.
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatTurn, GenerationError, TextGenerator};
use crate::config::GenerationConfig;

// ── Response shapes ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ── Client ───────────────────────────────────────────────────────────

pub struct GeminiGenerator {
    client: Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: f32,
}

impl GeminiGenerator {
    /// Build a client from config, reading the API key from the configured
    /// environment variable. A missing key is reported on first use.
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent("reliefnet")
            .build()?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
        })
    }

    /// Override the key taken from the environment.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn generate(&self, body: &Value) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::MissingApiKey(self.api_key_env.clone()))?;

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        extract_text(&text)
    }
}

impl TextGenerator for GeminiGenerator {
    async fn generate_list(
        &self,
        instruction: &str,
        items: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        debug!("Requesting {} list items from {}", items.len(), self.model);
        let body = list_request_body(instruction, items)?;
        let text = self.generate(&body).await?;
        parse_string_array(&text)
    }

    async fn generate_reply(
        &self,
        system_instruction: &str,
        turns: &[ChatTurn],
    ) -> Result<String, GenerationError> {
        let body = chat_request_body(system_instruction, turns, self.temperature);
        self.generate(&body).await
    }
}

// ── Request/response helpers ─────────────────────────────────────────

fn list_request_body(instruction: &str, items: &[String]) -> Result<Value, GenerationError> {
    let prompt = format!("{instruction}\n\nStrings: {}", serde_json::to_string(items)?);
    Ok(json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": { "type": "ARRAY", "items": { "type": "STRING" } }
        }
    }))
}

fn chat_request_body(system_instruction: &str, turns: &[ChatTurn], temperature: f32) -> Value {
    let contents: Vec<Value> = turns
        .iter()
        .map(|t| json!({ "role": t.role.as_str(), "parts": [{ "text": t.text }] }))
        .collect();
    json!({
        "contents": contents,
        "systemInstruction": { "parts": [{ "text": system_instruction }] },
        "generationConfig": { "temperature": temperature }
    })
}

/// Map a non-success HTTP response to a typed error.
fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let (message, api_status) = match serde_json::from_str::<ErrorPayload>(body) {
        Ok(p) => (p.error.message, p.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    let lower = message.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || lower.contains("quota")
    {
        return GenerationError::QuotaExceeded(message);
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || api_status == "PERMISSION_DENIED"
        || lower.contains("api key")
    {
        return GenerationError::Auth(message);
    }
    GenerationError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, GenerationError> {
    let resp: GenerateResponse = serde_json::from_str(body)?;
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("no candidates in response".to_string()))?;

    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default())
}

fn parse_string_array(text: &str) -> Result<Vec<String>, GenerationError> {
    serde_json::from_str(text.trim())
        .map_err(|e| GenerationError::Malformed(format!("expected JSON array of strings: {e}")))
}

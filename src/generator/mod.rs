/// Text-generation trait and shared types.
///
/// The translation cache and the assistant talk to a generative model only
/// through [`TextGenerator`]; the HTTP client lives in [`gemini`] and a
/// deterministic stand-in in [`mock`].
pub mod gemini;
pub mod mock;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while calling the generation API.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Trait for generative text backends.
///
/// Implementations must be `Send + Sync` so the translation cache can drive
/// them from spawned tasks.
pub trait TextGenerator: Send + Sync {
    /// Apply `instruction` to every item and return one output per item,
    /// in the same order.
    fn generate_list(
        &self,
        instruction: &str,
        items: &[String],
    ) -> impl Future<Output = Result<Vec<String>, GenerationError>> + Send;

    /// Produce the next model turn for a conversation.
    fn generate_reply(
        &self,
        system_instruction: &str,
        turns: &[ChatTurn],
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

//! Safety chat assistant.
//!
//! Wraps a [`TextGenerator`] with the relief system instruction, cleans up
//! the conversation history and turns generation failures into outcomes the
//! caller can render.
use tracing::{error, warn};

use crate::generator::{ChatRole, ChatTurn, GenerationError, TextGenerator};

pub const SYSTEM_INSTRUCTION: &str = "You are the ReliefNet AI Assistant. \
Your goal is to help users report disasters, find safety information, and understand how to donate. \
ReliefNet operates in the Bangalore region. Be calm, empathetic, and concise. \
If a user reports an emergency, advise them to contact local emergency services (112/100) immediately.";

/// Shown when the model answers with nothing.
pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm here to help, but I didn't receive a response. Could you try asking that again?";

/// Shown when the service could not be reached for any other reason.
pub const UNAVAILABLE_MESSAGE: &str = "I'm having a bit of trouble connecting to my service. \
Please check your internet connection and ensure a valid API key is selected.";

/// Result of one assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Text(String),
    QuotaExceeded,
    AuthError,
    Unavailable,
}

impl ChatReply {
    /// Text to show the user.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            ChatReply::Text(text) => text,
            ChatReply::QuotaExceeded => {
                "The assistant has reached its usage limit. Please try again later."
            }
            ChatReply::AuthError => "The assistant is not authorized. Please check the API key.",
            ChatReply::Unavailable => UNAVAILABLE_MESSAGE,
        }
    }
}

/// Reduce `history` to strictly alternating turns that start with the user
/// and end with the model, ready for a new user message.
///
/// Turns that would break the alternation are dropped, as is a trailing
/// user turn that never got an answer.
pub fn normalize_history(history: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = Vec::with_capacity(history.len());
    for turn in history {
        let expected = match turns.last() {
            None | Some(ChatTurn { role: ChatRole::Model, .. }) => ChatRole::User,
            Some(ChatTurn { role: ChatRole::User, .. }) => ChatRole::Model,
        };
        if turn.role == expected {
            turns.push(turn.clone());
        }
    }
    if turns.last().is_some_and(|t| t.role == ChatRole::User) {
        turns.pop();
    }
    turns
}

pub struct Assistant<G: TextGenerator> {
    generator: G,
}

impl<G: TextGenerator> Assistant<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Send `message` with the prior `history` and classify the answer.
    pub async fn reply(&self, history: &[ChatTurn], message: &str) -> ChatReply {
        let mut turns = normalize_history(history);
        turns.push(ChatTurn::user(message));

        match self.generator.generate_reply(SYSTEM_INSTRUCTION, &turns).await {
            Ok(text) if text.trim().is_empty() => ChatReply::Text(EMPTY_REPLY_FALLBACK.to_string()),
            Ok(text) => ChatReply::Text(text),
            Err(GenerationError::QuotaExceeded(msg)) => {
                warn!("Assistant quota exceeded: {}", msg);
                ChatReply::QuotaExceeded
            }
            Err(e @ (GenerationError::Auth(_) | GenerationError::MissingApiKey(_))) => {
                warn!("Assistant not authorized: {}", e);
                ChatReply::AuthError
            }
            Err(e) => {
                error!("Assistant request failed: {}", e);
                ChatReply::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::mock::MockGenerator;

    #[test]
    fn test_normalize_drops_leading_model_turn() {
        let history = vec![
            ChatTurn::model("Hello! How can I help?"),
            ChatTurn::user("Is Silk Board flooded?"),
            ChatTurn::model("Yes, avoid it."),
        ];
        let turns = normalize_history(&history);
        assert_eq!(turns, history[1..].to_vec());
    }

    #[test]
    fn test_normalize_collapses_repeats() {
        let history = vec![
            ChatTurn::user("first"),
            ChatTurn::user("second"),
            ChatTurn::model("answer"),
            ChatTurn::model("extra"),
            ChatTurn::user("dangling"),
        ];
        let turns = normalize_history(&history);
        assert_eq!(
            turns,
            vec![ChatTurn::user("first"), ChatTurn::model("answer")]
        );
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_history(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_reply_appends_message() {
        let assistant = Assistant::new(MockGenerator::new());
        let history = vec![ChatTurn::model("Welcome to ReliefNet.")];

        let reply = assistant.reply(&history, "Where can I donate?").await;
        assert_eq!(reply, ChatReply::Text("You said: Where can I donate?".to_string()));
        assert_eq!(
            assistant.generator().last_turns(),
            vec![ChatTurn::user("Where can I donate?")]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back() {
        let generator = MockGenerator::new();
        generator.reply_next("   ");
        let assistant = Assistant::new(generator);
        let reply = assistant.reply(&[], "hi").await;
        assert_eq!(reply.message(), EMPTY_REPLY_FALLBACK);
    }

    #[tokio::test]
    async fn test_failures_are_classified() {
        let generator = MockGenerator::new();
        generator.fail_next(GenerationError::QuotaExceeded("429".into()));
        generator.fail_next(GenerationError::Auth("403".into()));
        generator.fail_next(GenerationError::MissingApiKey("API_KEY".into()));
        generator.fail_next(GenerationError::Malformed("no candidates".into()));
        let assistant = Assistant::new(generator);

        assert_eq!(assistant.reply(&[], "a").await, ChatReply::QuotaExceeded);
        assert_eq!(assistant.reply(&[], "b").await, ChatReply::AuthError);
        assert_eq!(assistant.reply(&[], "c").await, ChatReply::AuthError);
        assert_eq!(assistant.reply(&[], "d").await, ChatReply::Unavailable);
        assert_eq!(
            assistant.reply(&[], "e").await,
            ChatReply::Text("You said: e".to_string())
        );
    }
}

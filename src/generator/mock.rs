/// Mock generator for tests and offline runs.
///
/// Translates from fixed dictionaries, echoes chat messages, and can be
/// scripted to fail, stall, or return short responses. The target language
/// of a list request is read from its instruction.
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{ChatRole, ChatTurn, GenerationError, TextGenerator};
use crate::translation::{Language, translation_instruction};

#[derive(Default)]
struct MockState {
    failures: VecDeque<GenerationError>,
    replies: VecDeque<String>,
    batches: Vec<Vec<String>>,
    last_turns: Vec<ChatTurn>,
}

/// A scriptable in-process [`TextGenerator`].
#[derive(Default)]
pub struct MockGenerator {
    dictionary: HashMap<String, String>,
    by_language: HashMap<(Language, String), String>,
    latency: Option<Duration>,
    truncate: bool,
    state: Mutex<MockState>,
}

impl MockGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed translations used for any target language. Items found in
    /// neither dictionary come back as `<item>`.
    #[must_use]
    pub fn with_translations<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.dictionary
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Seed translations that only apply when the instruction targets `lang`.
    #[must_use]
    pub fn with_translations_for<I, K, V>(mut self, lang: Language, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.by_language
            .extend(pairs.into_iter().map(|(k, v)| ((lang, k.into()), v.into())));
        self
    }

    fn lookup(&self, target: Option<Language>, item: &str) -> String {
        target
            .and_then(|lang| self.by_language.get(&(lang, item.to_string())))
            .or_else(|| self.dictionary.get(item))
            .cloned()
            .unwrap_or_else(|| format!("<{item}>"))
    }

    /// Delay every call by `latency` (tokio time, so paused clocks apply).
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Drop the last element of every list response.
    #[must_use]
    pub fn with_short_responses(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Make the next call fail with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: GenerationError) {
        self.lock().failures.push_back(error);
    }

    /// Script the next chat reply.
    pub fn reply_next(&self, reply: impl Into<String>) {
        self.lock().replies.push_back(reply.into());
    }

    /// Every list request received so far, in call order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.lock().batches.clone()
    }

    /// Number of list requests received so far.
    pub fn call_count(&self) -> usize {
        self.lock().batches.len()
    }

    /// Turns passed to the most recent chat request.
    pub fn last_turns(&self) -> Vec<ChatTurn> {
        self.lock().last_turns.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl TextGenerator for MockGenerator {
    async fn generate_list(
        &self,
        instruction: &str,
        items: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        let failure = {
            let mut state = self.lock();
            state.batches.push(items.to_vec());
            state.failures.pop_front()
        };
        self.wait().await;
        if let Some(err) = failure {
            return Err(err);
        }

        let target = Language::ALL
            .into_iter()
            .find(|lang| translation_instruction(*lang) == instruction);
        let mut out: Vec<String> = items.iter().map(|item| self.lookup(target, item)).collect();
        if self.truncate {
            out.pop();
        }
        Ok(out)
    }

    async fn generate_reply(
        &self,
        _system_instruction: &str,
        turns: &[ChatTurn],
    ) -> Result<String, GenerationError> {
        let (failure, scripted) = {
            let mut state = self.lock();
            state.last_turns = turns.to_vec();
            (state.failures.pop_front(), state.replies.pop_front())
        };
        self.wait().await;
        if let Some(err) = failure {
            return Err(err);
        }

        Ok(scripted.unwrap_or_else(|| {
            let last = turns
                .iter()
                .rev()
                .find(|t| t.role == ChatRole::User)
                .map(|t| t.text.as_str())
                .unwrap_or_default();
            format!("You said: {last}")
        }))
    }
}

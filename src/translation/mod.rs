//! UI text translation: supported languages, content hashing, and the
//! batched translation cache.
pub mod cache;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::generator::GenerationError;

/// Languages the interface can be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "kn")]
    Kannada,
    #[serde(rename = "hi")]
    Hindi,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Kannada, Language::Hindi];

    /// ISO 639-1 code, also the key used in the persisted cache.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Kannada => "kn",
            Language::Hindi => "hi",
        }
    }

    /// English name, as used in model prompts.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Kannada => "Kannada",
            Language::Hindi => "Hindi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported language code: {s}"))
    }
}

/// Deterministic cache key for a source string.
///
/// A 32-bit rolling hash (`h = 31·h + unit`) over UTF-16 code units,
/// rendered as `tr_` plus the base-36 magnitude. Existing persisted caches
/// are keyed this way, so the scheme must not change.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    format!("tr_{}", to_base36(i64::from(hash).unsigned_abs()))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Prompt sent with every translation batch.
#[must_use]
pub fn translation_instruction(target: Language) -> String {
    format!(
        "Translate the following list of strings into {}. \
         Return ONLY a JSON array of strings in the exact same order. \
         Do not explain anything.",
        target.name()
    )
}

/// Result of the most recent batch fill for a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Success { translated: usize },
    TransientFailure,
    QuotaExceeded,
    AuthError,
}

impl FlushOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, FlushOutcome::Success { .. })
    }
}

impl From<&GenerationError> for FlushOutcome {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::QuotaExceeded(_) => FlushOutcome::QuotaExceeded,
            GenerationError::Auth(_) | GenerationError::MissingApiKey(_) => FlushOutcome::AuthError,
            _ => FlushOutcome::TransientFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_content_hash_known_values() {
        assert_eq!(content_hash("Home"), "tr_1cc1r");
        assert_eq!(content_hash("Donations"), "tr_c92ynz");
        assert_eq!(content_hash("Report an Incident"), "tr_iflx5");
        assert_eq!(content_hash("ಮುಖಪುಟ"), "tr_pq2m1x");
        assert_eq!(content_hash(""), "tr_0");
    }

    #[test]
    fn test_content_hash_deterministic() {
        let text = "No verified disaster reports within a 10km radius.";
        assert_eq!(content_hash(text), content_hash(text));
        assert_ne!(content_hash("Home"), content_hash("home"));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(2_147_483_648), "zik0zk");
    }

    #[test]
    fn test_language_codes() {
        assert_eq!("kn".parse::<Language>().unwrap(), Language::Kannada);
        assert_eq!(" HI ".parse::<Language>().unwrap(), Language::Hindi);
        assert!("fr".parse::<Language>().is_err());
        assert_eq!(Language::Kannada.to_string(), "kn");
        assert_eq!(serde_json::to_string(&Language::Hindi).unwrap(), "\"hi\"");
    }

    #[test]
    fn test_instruction_names_language() {
        let prompt = translation_instruction(Language::Kannada);
        assert!(prompt.contains("into Kannada"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn test_outcome_from_error() {
        let quota = GenerationError::QuotaExceeded("429".to_string());
        let auth = GenerationError::MissingApiKey("API_KEY".to_string());
        let timeout = GenerationError::Timeout(Duration::from_secs(1));
        assert_eq!(FlushOutcome::from(&quota), FlushOutcome::QuotaExceeded);
        assert_eq!(FlushOutcome::from(&auth), FlushOutcome::AuthError);
        assert_eq!(FlushOutcome::from(&timeout), FlushOutcome::TransientFailure);
    }
}

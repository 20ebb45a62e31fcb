//! Translation engine seam and the per-(post, language) cache on top of it.

pub mod cache;
pub mod openai;
pub mod single_flight;

pub use cache::TranslationCache;
pub use openai::OpenAiEngine;
pub use single_flight::KeyedLocks;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Provider tag used when the source text is returned untranslated.
pub const PROVIDER_NONE: &str = "none";

/// Language that is always served verbatim, whatever the source language.
pub const VERBATIM_LANG: &str = "en";

/// An external text translator.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Tag stored alongside cached output, e.g. `openai:gpt-5-nano`.
    fn provider_tag(&self) -> String;

    /// Translate `text` into `target_lang`.
    ///
    /// `Ok(None)` means the engine produced nothing usable and the caller
    /// should fall back to the source text.
    async fn translate(&self, text: &str, target_lang: &str) -> Result<Option<String>>;
}

/// Engine used when no API key is configured. Never calls out.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEngine;

#[async_trait]
impl TranslationEngine for DisabledEngine {
    fn provider_tag(&self) -> String {
        PROVIDER_NONE.to_string()
    }

    async fn translate(&self, _text: &str, _target_lang: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Text chosen for one post in one requested language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedText {
    pub text: String,
    pub lang_out: String,
    pub provider: String,
}

impl TranslatedText {
    /// The source text returned as-is.
    #[must_use]
    pub fn untranslated(text: &str, source_lang: &str) -> Self {
        Self {
            text: text.to_string(),
            lang_out: source_lang.to_string(),
            provider: PROVIDER_NONE.to_string(),
        }
    }
}

/// Normalize a language tag to its lowercase primary subtag.
///
/// `ru-RU` and `RU_ru` become `ru`. Returns `None` unless the subtag is 2-8
/// ASCII letters.
#[must_use]
pub fn normalize_lang(raw: &str) -> Option<String> {
    let primary = raw.trim().split(['-', '_']).next()?.to_ascii_lowercase();
    let valid = (2..=8).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_lowercase());
    valid.then_some(primary)
}

/// Whether `candidate` differs from `source` once case and whitespace are ignored.
#[must_use]
pub fn materially_differs(source: &str, candidate: &str) -> bool {
    fn squash(s: &str) -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    }
    squash(source) != squash(candidate)
}

/// Hex SHA-256 of the text a translation was produced from.
#[must_use]
pub fn source_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// English name of a language code, for the engine prompt.
#[must_use]
pub fn language_name(code: &str) -> &str {
    match code {
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "be" => "Belarusian",
        "en" => "English",
        "de" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pl" => "Polish",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "cs" => "Czech",
        "lt" => "Lithuanian",
        "lv" => "Latvian",
        "et" => "Estonian",
        "ka" => "Georgian",
        "hy" => "Armenian",
        "kk" => "Kazakh",
        "tr" => "Turkish",
        "he" => "Hebrew",
        "ar" => "Arabic",
        "zh" => "Chinese (Simplified)",
        "ja" => "Japanese",
        "ko" => "Korean",
        other => other,
    }
}

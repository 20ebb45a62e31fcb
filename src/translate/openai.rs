//! OpenAI-compatible chat-completions translator.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{language_name, materially_differs, TranslationEngine};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Literal translation through a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEngine {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    source_lang: String,
}

impl OpenAiEngine {
    /// Build an engine from configuration. Returns `Ok(None)` without an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.openai_api_key.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(config.translation_timeout)
            .build()
            .context("Failed to build translation HTTP client")?;

        Ok(Some(Self {
            http,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.translation_model.clone(),
            source_lang: config.source_lang.clone(),
        }))
    }

    fn system_prompt(&self, target_lang: &str) -> String {
        format!(
            "You are a translation engine. Translate the user's message from {} into {} \
             literally. Output only the translation: no explanations, no notes, no quotes \
             around the result. Preserve punctuation, links, line breaks, hashtags and emojis \
             exactly. If the text is already in the target language, return it unchanged.",
            language_name(&self.source_lang),
            language_name(target_lang)
        )
    }
}

#[async_trait]
impl TranslationEngine for OpenAiEngine {
    fn provider_tag(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<Option<String>> {
        let prompt = self.system_prompt(target_lang);
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Translation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Translation API returned {status}: {}",
                body.chars().take(200).collect::<String>()
            );
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        let output = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        match output {
            Some(translated) if materially_differs(text, &translated) => Ok(Some(translated)),
            Some(_) => {
                debug!(target_lang, "Translation echoed the source text");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

//! Telegram Bot API client and update model.

pub mod media;
pub mod types;

pub use media::{plan_attachment, select_photo_variants, AttachmentPlan};
pub use types::{Chat, Document, Message, PhotoSize, Update};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("bot token not configured")]
    NotConfigured,
    #[error("telegram request failed: {0}")]
    Http(reqwest::Error),
    #[error("telegram API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    #[error("file not found")]
    NotFound,
}

impl From<reqwest::Error> for TelegramError {
    // Request URLs embed the bot token, so strip them before they reach a log line.
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api {
                code: self.error_code,
                description: self
                    .description
                    .unwrap_or_else(|| "missing result".to_string()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct File {
    #[serde(default)]
    file_path: Option<String>,
}

/// Thin Bot API client holding the server-side bot credential.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl TelegramClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(config.telegram_timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: config.telegram_api_base.trim_end_matches('/').to_string(),
            token: config.telegram_bot_token.clone(),
        })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, TelegramError> {
        self.token.as_deref().ok_or(TelegramError::NotConfigured)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<T, TelegramError> {
        let url = format!("{}/bot{}/{method}", self.api_base, self.token()?);
        let response = self.http.get(url).query(params).send().await?;
        let body: ApiResponse<T> = response.json().await?;
        body.into_result()
    }

    /// Resolve a file id to a downloadable file path (`getFile`).
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, the request fails, or the
    /// API does not return a path.
    pub async fn get_file_path(&self, file_id: &str) -> Result<String, TelegramError> {
        let file: File = self.call("getFile", &[("file_id", file_id)]).await?;
        debug!(file_id, has_path = file.file_path.is_some(), "Resolved telegram file");
        file.file_path.ok_or(TelegramError::NotFound)
    }

    /// Start downloading a file. The response status has already been checked.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::NotFound`] on a provider 404 and
    /// [`TelegramError::Api`] for any other non-success status.
    pub async fn download_file(&self, file_path: &str) -> Result<reqwest::Response, TelegramError> {
        let url = format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.token()?,
            file_path.trim_start_matches('/')
        );
        let response = self.http.get(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(TelegramError::NotFound),
            status => Err(TelegramError::Api {
                code: Some(i64::from(status.as_u16())),
                description: status.to_string(),
            }),
        }
    }

    /// Bot identity, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_me(&self) -> Result<serde_json::Value, TelegramError> {
        self.call("getMe", &[]).await
    }

    /// Current webhook registration, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_webhook_info(&self) -> Result<serde_json::Value, TelegramError> {
        self.call("getWebhookInfo", &[]).await
    }
}

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::translate::normalize_lang;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// A monitored Telegram channel and the webhook that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Logical key used in routes and the `channel` column (e.g. "now").
    pub key: String,
    /// Shared secret Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: String,
    /// Public username, used to build `t.me` links when the update lacks one.
    pub username: Option<String>,
    /// Expected chat (`@username` or numeric id). Other chats are ignored.
    pub chat: Option<String>,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub media_base_path: String,
    pub feed_rate_limit_per_min: u32,
    /// Key rate limits on the last `X-Forwarded-For` hop instead of the peer.
    pub trust_forwarded_for: bool,
    pub admin_secret: Option<String>,

    // Channels
    pub channels: Vec<ChannelConfig>,

    // Telegram Bot API
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
    pub telegram_timeout: Duration,

    // Translation
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub translation_model: String,
    pub translation_timeout: Duration,
    pub source_lang: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/news.sqlite")),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            media_base_path: env_or_default("MEDIA_BASE_PATH", "/tg-file"),
            feed_rate_limit_per_min: parse_env_u32("FEED_RATE_LIMIT_PER_MIN", 120)?,
            trust_forwarded_for: parse_env_bool("TRUST_FORWARDED_FOR", false)?,
            admin_secret: optional_env("ADMIN_SECRET"),

            // Channels
            channels: parse_channels(&required_env("CHANNELS")?)?,

            // Telegram Bot API
            telegram_bot_token: optional_env("TELEGRAM_BOT_TOKEN"),
            telegram_api_base: env_or_default("TELEGRAM_API_BASE", "https://api.telegram.org"),
            telegram_timeout: Duration::from_secs(parse_env_u64("TELEGRAM_TIMEOUT_SECS", 15)?),

            // Translation
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            translation_model: env_or_default("TRANSLATION_MODEL", "gpt-5-nano"),
            translation_timeout: Duration::from_secs(parse_env_u64(
                "TRANSLATION_TIMEOUT_SECS",
                30,
            )?),
            source_lang: {
                let raw = env_or_default("SOURCE_LANG", "en");
                normalize_lang(&raw).unwrap_or(raw)
            },
        })
    }

    /// Configuration with sane defaults and a single `now` channel, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            media_base_path: "/tg-file".to_string(),
            feed_rate_limit_per_min: 0,
            trust_forwarded_for: false,
            admin_secret: Some("admin-secret".to_string()),
            channels: vec![ChannelConfig {
                key: "now".to_string(),
                webhook_secret: "now-secret".to_string(),
                username: Some("memorial_now".to_string()),
                chat: None,
            }],
            telegram_bot_token: Some("123:TEST".to_string()),
            telegram_api_base: "http://127.0.0.1:9".to_string(),
            telegram_timeout: Duration::from_secs(5),
            openai_api_key: None,
            openai_base_url: "http://127.0.0.1:9/v1".to_string(),
            translation_model: "gpt-5-nano".to_string(),
            translation_timeout: Duration::from_secs(5),
            source_lang: "en".to_string(),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "CHANNELS".to_string(),
                message: "at least one channel is required".to_string(),
            });
        }
        for channel in &self.channels {
            if channel.webhook_secret.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: secret_var(&channel.key),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        for (name, value) in [
            ("TELEGRAM_API_BASE", &self.telegram_api_base),
            ("OPENAI_BASE_URL", &self.openai_base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: format!("not a valid URL: {e}"),
                });
            }
        }
        if self.telegram_timeout.is_zero() || self.translation_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "TIMEOUT_SECS".to_string(),
                message: "timeouts must be at least 1 second".to_string(),
            });
        }
        if normalize_lang(&self.source_lang).is_none() {
            return Err(ConfigError::InvalidValue {
                name: "SOURCE_LANG".to_string(),
                message: format!("'{}' is not a language code", self.source_lang),
            });
        }
        Ok(())
    }

    /// Look up a configured channel by key.
    #[must_use]
    pub fn channel(&self, key: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.key == key)
    }

    /// The channel served when a feed request names none.
    #[must_use]
    pub fn default_channel(&self) -> Option<&ChannelConfig> {
        self.channels.first()
    }
}

fn secret_var(key: &str) -> String {
    format!("TG_WEBHOOK_SECRET_{}", env_suffix(key))
}

fn env_suffix(key: &str) -> String {
    key.to_uppercase().replace('-', "_")
}

fn parse_channels(list: &str) -> Result<Vec<ChannelConfig>, ConfigError> {
    let mut channels: Vec<ChannelConfig> = Vec::new();
    for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let key = key.to_lowercase();
        if !is_valid_channel_key(&key) {
            return Err(ConfigError::InvalidValue {
                name: "CHANNELS".to_string(),
                message: format!("'{key}' must match [a-z0-9_-]+"),
            });
        }
        if channels.iter().any(|c| c.key == key) {
            continue;
        }
        let suffix = env_suffix(&key);
        channels.push(ChannelConfig {
            webhook_secret: required_env(&secret_var(&key))?,
            username: optional_env(&format!("TG_CHANNEL_USERNAME_{suffix}"))
                .map(|u| u.trim_start_matches('@').to_string()),
            chat: optional_env(&format!("TG_CHANNEL_CHAT_{suffix}")),
            key,
        });
    }
    Ok(channels)
}

fn is_valid_channel_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_channel_env() {
        for var in [
            "CHANNELS",
            "TG_WEBHOOK_SECRET_NOW",
            "TG_WEBHOOK_SECRET_NICO",
            "TG_WEBHOOK_SECRET_ON_AIR",
            "TG_CHANNEL_USERNAME_NOW",
            "TG_CHANNEL_CHAT_NOW",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_parse_channels() {
        clear_channel_env();
        std::env::set_var("TG_WEBHOOK_SECRET_NOW", "s1");
        std::env::set_var("TG_WEBHOOK_SECRET_NICO", "s2");
        std::env::set_var("TG_CHANNEL_USERNAME_NOW", "@memorial_now");

        let channels = parse_channels("now, NICO,,now").unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].key, "now");
        assert_eq!(channels[0].webhook_secret, "s1");
        assert_eq!(channels[0].username.as_deref(), Some("memorial_now"));
        assert_eq!(channels[1].key, "nico");
        assert!(channels[1].username.is_none());

        clear_channel_env();
    }

    #[test]
    #[serial]
    fn test_hyphenated_channel_key_maps_to_underscore_var() {
        clear_channel_env();
        std::env::set_var("TG_WEBHOOK_SECRET_ON_AIR", "s3");

        let channels = parse_channels("on-air").unwrap();
        assert_eq!(channels[0].key, "on-air");
        assert_eq!(channels[0].webhook_secret, "s3");

        clear_channel_env();
    }

    #[test]
    #[serial]
    fn test_missing_channel_secret() {
        clear_channel_env();
        let err = parse_channels("now").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "TG_WEBHOOK_SECRET_NOW"));
    }

    #[test]
    #[serial]
    fn test_parse_bool() {
        std::env::remove_var("TRUST_FORWARDED_FOR");
        assert!(!parse_env_bool("TRUST_FORWARDED_FOR", false).unwrap());

        std::env::set_var("TRUST_FORWARDED_FOR", "Yes");
        assert!(parse_env_bool("TRUST_FORWARDED_FOR", false).unwrap());

        std::env::set_var("TRUST_FORWARDED_FOR", "maybe");
        assert!(matches!(
            parse_env_bool("TRUST_FORWARDED_FOR", false),
            Err(ConfigError::ParseBool { .. })
        ));

        std::env::remove_var("TRUST_FORWARDED_FOR");
    }

    #[test]
    fn test_invalid_channel_key() {
        assert!(parse_channels("no w").is_err());
        assert!(parse_channels("news/1").is_err());
    }

    #[test]
    fn test_validate_testing_config() {
        let config = Config::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_channel().unwrap().key, "now");
        assert!(config.channel("nico").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::for_testing();
        config.telegram_api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::for_testing();
        config.source_lang = "english!".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::for_testing();
        config.channels.clear();
        assert!(config.validate().is_err());
    }
}

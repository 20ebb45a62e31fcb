use serde::{Deserialize, Serialize};

/// A captured message from a monitored channel.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub channel: String,
    pub message_id: i64,
    pub date: String,
    pub link: Option<String>,
    pub text_src: String,
    pub hidden: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for inserting or refreshing a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub channel: String,
    pub message_id: i64,
    pub date: String,
    pub link: Option<String>,
    pub text_src: String,
}

/// Kind of attachment a media row was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Document,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Document => "document",
        }
    }
}

/// Provider file references for an image attached to a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub post_id: i64,
    pub kind: String,
    pub file_id_thumb: Option<String>,
    pub file_id_full: Option<String>,
    pub file_path_thumb: Option<String>,
    pub file_path_full: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Data for inserting a media row.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub kind: MediaKind,
    pub file_id_thumb: Option<String>,
    pub file_id_full: Option<String>,
    pub file_path_thumb: Option<String>,
    pub file_path_full: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Which stored rendition of a media row to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaVariant {
    Thumb,
    Full,
}

impl MediaVariant {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumb => "thumb",
            Self::Full => "full",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "thumb" => Some(Self::Thumb),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

impl Media {
    /// The stored file id for a variant.
    #[must_use]
    pub fn file_id(&self, variant: MediaVariant) -> Option<&str> {
        match variant {
            MediaVariant::Thumb => self.file_id_thumb.as_deref(),
            MediaVariant::Full => self.file_id_full.as_deref(),
        }
    }

    /// The resolved provider file path for a variant, if the lookup succeeded.
    #[must_use]
    pub fn file_path(&self, variant: MediaVariant) -> Option<&str> {
        match variant {
            MediaVariant::Thumb => self.file_path_thumb.as_deref(),
            MediaVariant::Full => self.file_path_full.as_deref(),
        }
    }
}

/// A cached translation of a post into one language.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Translation {
    pub id: i64,
    pub post_id: i64,
    pub lang: String,
    pub text_tr: String,
    pub provider: String,
    pub source_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Per-channel counters for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelStats {
    pub channel: String,
    pub posts: i64,
    pub hidden_posts: i64,
    pub media: i64,
    pub translations: i64,
    pub latest_message_id: Option<i64>,
}

//! Subset of the Bot API push-update envelope that ingestion reads.

use serde::Deserialize;

/// A webhook update. At most one of the message fields is set.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub edited_channel_post: Option<Message>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
}

impl Update {
    /// The carried message, whichever field it arrived in.
    #[must_use]
    pub fn into_message(self) -> Option<Message> {
        self.channel_post
            .or(self.edited_channel_post)
            .or(self.message)
            .or(self.edited_message)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    /// Unix timestamp (seconds).
    pub date: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub document: Option<Document>,
}

impl Message {
    /// Text body, falling back to the media caption.
    #[must_use]
    pub fn body(&self) -> &str {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    /// Whether this chat is the one named by `expected` (`@username`, `username` or numeric id).
    #[must_use]
    pub fn matches(&self, expected: &str) -> bool {
        let expected = expected.trim();
        if let Ok(id) = expected.parse::<i64>() {
            return id == self.id;
        }
        let expected = expected.trim_start_matches('@');
        self.username
            .as_deref()
            .is_some_and(|u| u.eq_ignore_ascii_case(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: Option<String>,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub file_size: Option<i64>,
}

impl PhotoSize {
    #[must_use]
    pub fn area(&self) -> i64 {
        self.width.saturating_mul(self.height)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, alias = "thumb")]
    pub thumbnail: Option<PhotoSize>,
}

impl Document {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }
}

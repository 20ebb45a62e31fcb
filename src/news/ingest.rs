//! Turning webhook updates into stored posts and media.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::db::{self, Database, NewMedia, NewPost};
use crate::telegram::{plan_attachment, AttachmentPlan, Message, TelegramClient, Update};

/// Why an update was acknowledged without writing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoMessage,
    ForeignChat,
    Empty,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMessage => "no-message",
            Self::ForeignChat => "foreign-chat",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored {
        post_id: i64,
        media_id: Option<i64>,
    },
    Skipped(SkipReason),
}

/// Store the message carried by `update` under `channel`.
///
/// File lookups happen first and degrade to null paths on failure. The post
/// upsert and media replacement then share one transaction.
///
/// # Errors
///
/// Returns an error if the database write fails.
pub async fn ingest_update(
    db: &Database,
    telegram: &TelegramClient,
    channel: &ChannelConfig,
    update: Update,
) -> Result<IngestOutcome> {
    let update_id = update.update_id;
    let Some(message) = update.into_message() else {
        debug!(update_id, "Update carries no message");
        return Ok(IngestOutcome::Skipped(SkipReason::NoMessage));
    };

    if let Some(expected) = channel.chat.as_deref() {
        if !message.chat.matches(expected) {
            warn!(
                channel = %channel.key,
                chat_id = message.chat.id,
                "Ignoring update from unexpected chat"
            );
            return Ok(IngestOutcome::Skipped(SkipReason::ForeignChat));
        }
    }

    let plan = plan_attachment(&message);
    if message.body().trim().is_empty() && plan.is_none() {
        return Ok(IngestOutcome::Skipped(SkipReason::Empty));
    }

    let new_post = build_post(channel, &message);
    let new_media = match &plan {
        Some(plan) => Some(resolve_media(telegram, plan).await),
        None => None,
    };

    let mut tx = db
        .pool()
        .begin()
        .await
        .context("Failed to begin ingest transaction")?;

    let post_id = db::upsert_post(&mut *tx, &new_post).await?;
    let media_id = match &new_media {
        Some(media) => {
            db::delete_media_for_post(&mut *tx, post_id).await?;
            Some(db::insert_media(&mut *tx, post_id, media).await?)
        }
        None => None,
    };

    tx.commit()
        .await
        .context("Failed to commit ingest transaction")?;

    info!(
        channel = %channel.key,
        message_id = message.message_id,
        post_id,
        has_media = media_id.is_some(),
        "Stored channel post"
    );

    Ok(IngestOutcome::Stored { post_id, media_id })
}

fn build_post(channel: &ChannelConfig, message: &Message) -> NewPost {
    let date = DateTime::<Utc>::from_timestamp(message.date, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    let username = message
        .chat
        .username
        .as_deref()
        .or(channel.username.as_deref());

    NewPost {
        channel: channel.key.clone(),
        message_id: message.message_id,
        date,
        link: username.map(|u| format!("https://t.me/{u}/{}", message.message_id)),
        text_src: message.body().to_string(),
    }
}

async fn resolve_media(telegram: &TelegramClient, plan: &AttachmentPlan) -> NewMedia {
    let file_path_thumb = resolve_file_path(telegram, &plan.thumb_file_id).await;
    let file_path_full = if plan.single_file() {
        file_path_thumb.clone()
    } else {
        resolve_file_path(telegram, &plan.full_file_id).await
    };

    NewMedia {
        kind: plan.kind,
        file_id_thumb: Some(plan.thumb_file_id.clone()),
        file_id_full: Some(plan.full_file_id.clone()),
        file_path_thumb,
        file_path_full,
        width: plan.width,
        height: plan.height,
    }
}

async fn resolve_file_path(telegram: &TelegramClient, file_id: &str) -> Option<String> {
    match telegram.get_file_path(file_id).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!(file_id, error = %e, "File lookup failed, storing null path");
            None
        }
    }
}

//! Paginated feed of posts with media URLs and translated text.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;

use crate::db::{self, Database, Media, MediaVariant};
use crate::translate::TranslationCache;

/// Page size when the request names none.
pub const DEFAULT_LIMIT: i64 = 20;

/// Hard cap on page size.
pub const MAX_LIMIT: i64 = 50;

/// Clamp a requested page size to `1..=MAX_LIMIT`.
#[must_use]
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub channel: String,
    pub lang: String,
    pub limit: i64,
    pub before: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub channel: String,
    pub lang: String,
    pub items: Vec<FeedItem>,
    /// Cursor for the next page; `None` once the feed is exhausted.
    pub next_before: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub id: i64,
    pub message_id: i64,
    pub date: String,
    pub link: Option<String>,
    pub text: String,
    pub text_tr: String,
    pub lang_out: String,
    pub provider: String,
    pub media: Vec<FeedMedia>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMedia {
    pub id: i64,
    pub thumb_url: String,
    pub full_url: String,
}

/// URL of the media proxy for one variant.
#[must_use]
pub fn media_url(base_path: &str, media_id: i64, variant: MediaVariant) -> String {
    let sep = if base_path.contains('?') { '&' } else { '?' };
    format!("{base_path}{sep}id={media_id}&v={}", variant.as_str())
}

/// Load one page of the feed, translating each post in order.
///
/// Uncached translations are fetched sequentially before the page is returned.
///
/// # Errors
///
/// Returns an error if the database fails.
pub async fn load_feed(
    db: &Database,
    cache: &TranslationCache,
    media_base_path: &str,
    query: &FeedQuery,
) -> Result<FeedResponse> {
    let posts = db::list_feed_posts(db.pool(), &query.channel, query.before, query.limit).await?;

    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let mut media_by_post: HashMap<i64, Vec<Media>> = HashMap::new();
    for media in db::get_media_for_posts(db.pool(), &post_ids).await? {
        media_by_post.entry(media.post_id).or_default().push(media);
    }

    let mut items = Vec::with_capacity(posts.len());
    for post in posts {
        let translated = cache.resolve(&post, &query.lang).await?;
        let media = media_by_post
            .remove(&post.id)
            .unwrap_or_default()
            .into_iter()
            .map(|m| FeedMedia {
                id: m.id,
                thumb_url: media_url(media_base_path, m.id, MediaVariant::Thumb),
                full_url: media_url(media_base_path, m.id, MediaVariant::Full),
            })
            .collect();

        items.push(FeedItem {
            id: post.id,
            message_id: post.message_id,
            date: post.date,
            link: post.link,
            text: post.text_src,
            text_tr: translated.text,
            lang_out: translated.lang_out,
            provider: translated.provider,
            media,
        });
    }

    let next_before = if (items.len() as i64) < query.limit {
        None
    } else {
        items.last().map(|i| i.message_id)
    };

    Ok(FeedResponse {
        channel: query.channel.clone(),
        lang: query.lang.clone(),
        items,
        next_before,
    })
}

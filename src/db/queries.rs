use anyhow::{Context, Result};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};

use super::models::{ChannelStats, Media, MediaVariant, NewMedia, NewPost, Post, Translation};

// ========== Posts ==========

/// Insert a post, or refresh its text and date if (channel, message_id) exists.
///
/// Redelivery and edits only touch `text_src`, `date` and `updated_at`; the
/// row id, link, media and translations are left alone. Returns the row id.
pub async fn upsert_post<'e, E>(executor: E, post: &NewPost) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO tg_posts (channel, message_id, date, link, text_src)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (channel, message_id) DO UPDATE SET
            text_src = excluded.text_src,
            date = excluded.date,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
        RETURNING id
        ",
    )
    .bind(&post.channel)
    .bind(post.message_id)
    .bind(&post.date)
    .bind(&post.link)
    .bind(&post.text_src)
    .fetch_one(executor)
    .await
    .context("Failed to upsert post")?;

    Ok(id)
}

/// Get a post by its row id.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM tg_posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get a post by its channel and provider message id.
pub async fn get_post_by_message(
    pool: &SqlitePool,
    channel: &str,
    message_id: i64,
) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM tg_posts WHERE channel = ? AND message_id = ?")
        .bind(channel)
        .bind(message_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by message id")
}

/// Count stored posts for a channel, hidden ones included.
pub async fn count_posts(pool: &SqlitePool, channel: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tg_posts WHERE channel = ?")
        .bind(channel)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(count)
}

/// Visible posts for a channel, newest first, strictly below the `before` cursor.
pub async fn list_feed_posts(
    pool: &SqlitePool,
    channel: &str,
    before: Option<i64>,
    limit: i64,
) -> Result<Vec<Post>> {
    sqlx::query_as(
        r"
        SELECT * FROM tg_posts
        WHERE channel = ? AND hidden = 0 AND (? IS NULL OR message_id < ?)
        ORDER BY message_id DESC
        LIMIT ?
        ",
    )
    .bind(channel)
    .bind(before)
    .bind(before)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list feed posts")
}

/// Set or clear a post's hidden flag. Returns false if the post does not exist.
pub async fn set_post_hidden(pool: &SqlitePool, id: i64, hidden: bool) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE tg_posts
        SET hidden = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
        WHERE id = ?
        ",
    )
    .bind(hidden)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post visibility")?;

    Ok(result.rows_affected() > 0)
}

// ========== Media ==========

/// Delete all media rows of a post.
pub async fn delete_media_for_post<'e, E>(executor: E, post_id: i64) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM tg_media WHERE post_id = ?")
        .bind(post_id)
        .execute(executor)
        .await
        .context("Failed to delete media")?;

    Ok(result.rows_affected())
}

/// Insert a media row for a post, returning its ID.
pub async fn insert_media<'e, E>(executor: E, post_id: i64, media: &NewMedia) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        INSERT INTO tg_media (
            post_id, kind, file_id_thumb, file_id_full,
            file_path_thumb, file_path_full, width, height
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post_id)
    .bind(media.kind.as_str())
    .bind(&media.file_id_thumb)
    .bind(&media.file_id_full)
    .bind(&media.file_path_thumb)
    .bind(&media.file_path_full)
    .bind(media.width)
    .bind(media.height)
    .execute(executor)
    .await
    .context("Failed to insert media")?;

    Ok(result.last_insert_rowid())
}

/// Get a media row by id.
pub async fn get_media(pool: &SqlitePool, id: i64) -> Result<Option<Media>> {
    sqlx::query_as("SELECT * FROM tg_media WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch media")
}

/// Get all media rows for a set of posts, ordered by id.
pub async fn get_media_for_posts(pool: &SqlitePool, post_ids: &[i64]) -> Result<Vec<Media>> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM tg_media WHERE post_id IN (");
    let mut separated = builder.separated(", ");
    for id in post_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    builder
        .build_query_as::<Media>()
        .fetch_all(pool)
        .await
        .context("Failed to fetch media for posts")
}

/// Persist a file path resolved after ingestion.
pub async fn set_media_file_path(
    pool: &SqlitePool,
    id: i64,
    variant: MediaVariant,
    file_path: &str,
) -> Result<()> {
    let sql = match variant {
        MediaVariant::Thumb => "UPDATE tg_media SET file_path_thumb = ? WHERE id = ?",
        MediaVariant::Full => "UPDATE tg_media SET file_path_full = ? WHERE id = ?",
    };

    sqlx::query(sql)
        .bind(file_path)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update media file path")?;

    Ok(())
}

// ========== Translations ==========

/// Get the cached translation of a post into a language.
pub async fn get_translation(
    pool: &SqlitePool,
    post_id: i64,
    lang: &str,
) -> Result<Option<Translation>> {
    sqlx::query_as("SELECT * FROM tg_translations WHERE post_id = ? AND lang = ?")
        .bind(post_id)
        .bind(lang)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch translation")
}

/// Insert a translation, replacing any existing entry for (post, lang).
pub async fn upsert_translation(
    pool: &SqlitePool,
    post_id: i64,
    lang: &str,
    text_tr: &str,
    provider: &str,
    source_hash: &str,
) -> Result<Translation> {
    sqlx::query_as(
        r"
        INSERT INTO tg_translations (post_id, lang, text_tr, provider, source_hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (post_id, lang) DO UPDATE SET
            text_tr = excluded.text_tr,
            provider = excluded.provider,
            source_hash = excluded.source_hash,
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
        RETURNING *
        ",
    )
    .bind(post_id)
    .bind(lang)
    .bind(text_tr)
    .bind(provider)
    .bind(source_hash)
    .fetch_one(pool)
    .await
    .context("Failed to upsert translation")
}

/// Count cached translations of a post across all languages.
pub async fn count_translations_for_post(pool: &SqlitePool, post_id: i64) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM tg_translations WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(pool)
            .await
            .context("Failed to count translations")?;
    Ok(count)
}

// ========== Diagnostics ==========

/// Per-channel counters over posts, media and translations.
pub async fn get_channel_stats(pool: &SqlitePool) -> Result<Vec<ChannelStats>> {
    sqlx::query_as(
        r"
        SELECT
            p.channel,
            COUNT(*) AS posts,
            COALESCE(SUM(p.hidden), 0) AS hidden_posts,
            COALESCE(SUM(m.n), 0) AS media,
            COALESCE(SUM(t.n), 0) AS translations,
            MAX(p.message_id) AS latest_message_id
        FROM tg_posts p
        LEFT JOIN (SELECT post_id, COUNT(*) AS n FROM tg_media GROUP BY post_id) m
            ON m.post_id = p.id
        LEFT JOIN (SELECT post_id, COUNT(*) AS n FROM tg_translations GROUP BY post_id) t
            ON t.post_id = p.id
        GROUP BY p.channel
        ORDER BY p.channel
        ",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch channel stats")
}

// ========== Rate Limiting ==========

/// Record a hit in a fixed window and return the window's hit count so far.
pub async fn hit_rate_limit_window(
    pool: &SqlitePool,
    bucket: &str,
    window_start: i64,
) -> Result<i64> {
    let (hits,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO rate_limit_windows (bucket, window_start, hits)
        VALUES (?, ?, 1)
        ON CONFLICT (bucket, window_start) DO UPDATE SET hits = hits + 1
        RETURNING hits
        ",
    )
    .bind(bucket)
    .bind(window_start)
    .fetch_one(pool)
    .await
    .context("Failed to record rate limit hit")?;

    Ok(hits)
}

/// Drop windows that started before the given timestamp.
pub async fn prune_rate_limit_windows(pool: &SqlitePool, older_than: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM rate_limit_windows WHERE window_start < ?")
        .bind(older_than)
        .execute(pool)
        .await
        .context("Failed to prune rate limit windows")?;

    Ok(result.rows_affected())
}

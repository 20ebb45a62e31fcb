use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations, returning the resulting schema version.
pub async fn run(pool: &SqlitePool) -> Result<i32> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    get_schema_version(pool).await
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: posts, media and translations");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS tg_posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            link TEXT,
            text_src TEXT NOT NULL DEFAULT '',
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE (channel, message_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create tg_posts table")?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_tg_posts_feed
        ON tg_posts (channel, hidden, message_id DESC)
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create tg_posts feed index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS tg_media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES tg_posts(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            file_id_thumb TEXT,
            file_id_full TEXT,
            file_path_thumb TEXT,
            file_path_full TEXT,
            width INTEGER,
            height INTEGER
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create tg_media table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tg_media_post ON tg_media (post_id)")
        .execute(pool)
        .await
        .context("Failed to create tg_media post index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS tg_translations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES tg_posts(id) ON DELETE CASCADE,
            lang TEXT NOT NULL,
            text_tr TEXT NOT NULL,
            provider TEXT NOT NULL,
            source_hash TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            UNIQUE (post_id, lang)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create tg_translations table")?;

    Ok(())
}

async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: shared rate limit windows");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS rate_limit_windows (
            bucket TEXT NOT NULL,
            window_start INTEGER NOT NULL,
            hits INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (bucket, window_start)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create rate_limit_windows table")?;

    Ok(())
}

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use super::rate_limit::{check_rate_limit, client_key, RateLimitDecision};
use super::AppState;
use crate::db::{get_media, set_media_file_path, MediaVariant};
use crate::news::{clamp_limit, load_feed, FeedQuery};
use crate::telegram::TelegramError;
use crate::translate::normalize_lang;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

/// Create the router with the public read routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/news2", get(news_feed))
        .route("/tg-file", get(tg_file))
}

async fn health() -> &'static str {
    "OK"
}

// ========== Feed ==========

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    channel: Option<String>,
    lang: Option<String>,
    limit: Option<i64>,
    before: Option<i64>,
}

async fn news_feed(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(params): Query<FeedParams>,
) -> Response {
    let client = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.config.trust_forwarded_for,
    );
    let decision = check_rate_limit(
        &state.db,
        "feed",
        &client,
        state.config.feed_rate_limit_per_min,
        chrono::Utc::now().timestamp(),
    )
    .await;
    if let RateLimitDecision::Limited { retry_after_secs } = decision {
        tracing::warn!(client = %client, "Feed rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
            "Too many requests",
        )
            .into_response();
    }

    let channel = match params.channel.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => state.config.channel(&key.to_lowercase()),
        _ => state.config.default_channel(),
    };
    let Some(channel) = channel else {
        return (StatusCode::BAD_REQUEST, "Unknown channel").into_response();
    };

    let lang = match params.lang.as_deref() {
        None | Some("") => state.translations.source_lang().to_string(),
        Some(raw) => match normalize_lang(raw) {
            Some(lang) => lang,
            None => return (StatusCode::BAD_REQUEST, "Invalid lang").into_response(),
        },
    };

    let query = FeedQuery {
        channel: channel.key.clone(),
        lang,
        limit: clamp_limit(params.limit),
        before: params.before,
    };

    match load_feed(
        &state.db,
        &state.translations,
        &state.config.media_base_path,
        &query,
    )
    .await
    {
        Ok(feed) => Json(feed).into_response(),
        Err(e) => {
            tracing::error!(
                channel = %query.channel,
                lang = %query.lang,
                "Failed to load feed: {e:#}"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

// ========== Media Proxy ==========

#[derive(Debug, Deserialize)]
pub struct FileParams {
    id: Option<String>,
    v: Option<String>,
}

async fn tg_file(State(state): State<AppState>, Query(params): Query<FileParams>) -> Response {
    let Some(media_id) = params.id.as_deref().and_then(|id| id.trim().parse::<i64>().ok()) else {
        return (StatusCode::BAD_REQUEST, "Missing or invalid id").into_response();
    };
    let variant = match params.v.as_deref() {
        None | Some("") => MediaVariant::Full,
        Some(v) => match MediaVariant::parse(v) {
            Some(variant) => variant,
            None => return (StatusCode::BAD_REQUEST, "v must be thumb or full").into_response(),
        },
    };

    if !state.telegram.is_configured() {
        tracing::error!("Media requested but TELEGRAM_BOT_TOKEN is not set");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Bot token not configured").into_response();
    }

    let media = match get_media(state.db.pool(), media_id).await {
        Ok(Some(m)) => m,
        Ok(None) => return (StatusCode::NOT_FOUND, "Media not found").into_response(),
        Err(e) => {
            tracing::error!(media_id, "Failed to fetch media: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let file_path = match media.file_path(variant) {
        Some(path) => path.to_string(),
        None => {
            // Lookup failed at ingest time; try once more and remember the answer.
            let Some(file_id) = media.file_id(variant) else {
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            };
            match state.telegram.get_file_path(file_id).await {
                Ok(path) => {
                    if let Err(e) =
                        set_media_file_path(state.db.pool(), media_id, variant, &path).await
                    {
                        tracing::warn!(media_id, "Failed to persist resolved file path: {e:#}");
                    }
                    path
                }
                Err(e) => {
                    tracing::warn!(
                        media_id,
                        variant = variant.as_str(),
                        error = %e,
                        "File lookup failed"
                    );
                    return (StatusCode::NOT_FOUND, "File not found").into_response();
                }
            }
        }
    };

    let upstream = match state.telegram.download_file(&file_path).await {
        Ok(response) => response,
        Err(TelegramError::NotFound) => {
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        }
        Err(e) => {
            tracing::error!(media_id, error = %e, "Failed to download file from Telegram");
            return (StatusCode::BAD_GATEWAY, "Upstream error").into_response();
        }
    };

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map_or_else(
            || {
                mime_guess::from_path(&file_path)
                    .first_or_octet_stream()
                    .to_string()
            },
            str::to_string,
        );
    let content_length = upstream.content_length();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE),
    );
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    response
}

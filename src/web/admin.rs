//! Bearer-protected maintenance and diagnostic endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::RequireAdmin;
use super::AppState;
use crate::db::{get_channel_stats, get_post, set_post_hidden};
use crate::telegram::TelegramError;
use crate::translate::normalize_lang;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/db-migrate", post(db_migrate))
        .route("/diag-news", get(diag_news))
        .route("/diag-telegram", get(diag_telegram))
        .route("/diag-retranslate", post(diag_retranslate))
        .route("/diag-hide", post(diag_hide))
}

/// POST /db-migrate - Apply pending schema migrations.
async fn db_migrate(_admin: RequireAdmin, State(state): State<AppState>) -> Response {
    match state.db.migrate().await {
        Ok(version) => Json(json!({ "ok": true, "schema_version": version })).into_response(),
        Err(e) => {
            tracing::error!("Migration failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Migration failed").into_response()
        }
    }
}

/// GET /diag-news - Per-channel storage counters.
async fn diag_news(_admin: RequireAdmin, State(state): State<AppState>) -> Response {
    let stats = match get_channel_stats(state.db.pool()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to fetch channel stats: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    let configured: Vec<&str> = state.config.channels.iter().map(|c| c.key.as_str()).collect();

    Json(json!({
        "ok": true,
        "configured_channels": configured,
        "source_lang": state.translations.source_lang(),
        "channels": stats,
    }))
    .into_response()
}

fn diag_value(result: Result<Value, TelegramError>) -> Value {
    result.unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

/// GET /diag-telegram - Bot identity and webhook registration.
async fn diag_telegram(_admin: RequireAdmin, State(state): State<AppState>) -> Response {
    let me = diag_value(state.telegram.get_me().await);
    let webhook = diag_value(state.telegram.get_webhook_info().await);

    Json(json!({
        "ok": true,
        "configured": state.telegram.is_configured(),
        "me": me,
        "webhook": webhook,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RetranslateParams {
    post_id: i64,
    lang: String,
}

/// POST /diag-retranslate - Force a fresh engine call for one (post, lang).
async fn diag_retranslate(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<RetranslateParams>,
) -> Response {
    let Some(lang) = normalize_lang(&params.lang) else {
        return (StatusCode::BAD_REQUEST, "Invalid lang").into_response();
    };

    let post = match get_post(state.db.pool(), params.post_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Failed to fetch post: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    match state.translations.retranslate(&post, &lang).await {
        Ok(Some(entry)) => Json(json!({ "ok": true, "translation": entry })).into_response(),
        Ok(None) => Json(json!({ "ok": false, "reason": "engine-fallback" })).into_response(),
        Err(e) => {
            tracing::error!(post_id = post.id, lang = %lang, "Retranslation failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HideParams {
    post_id: i64,
    #[serde(default = "default_hidden")]
    hidden: bool,
}

fn default_hidden() -> bool {
    true
}

/// POST /diag-hide - Hide or unhide a post in the feed.
async fn diag_hide(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<HideParams>,
) -> Response {
    match set_post_hidden(state.db.pool(), params.post_id, params.hidden).await {
        Ok(true) => {
            tracing::info!(
                post_id = params.post_id,
                hidden = params.hidden,
                "Post visibility changed"
            );
            Json(json!({ "ok": true, "post_id": params.post_id, "hidden": params.hidden }))
                .into_response()
        }
        Ok(false) => (StatusCode::NOT_FOUND, "Post not found").into_response(),
        Err(e) => {
            tracing::error!("Failed to update post visibility: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

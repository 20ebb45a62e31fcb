//! Per-channel Telegram webhook ingress.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use super::auth::secrets_match;
use super::AppState;
use crate::news::{ingest_update, IngestOutcome};
use crate::telegram::Update;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub fn router() -> Router<AppState> {
    Router::new().route("/tg-webhook/:channel", post(telegram_webhook))
}

/// Handler for channel updates (POST /tg-webhook/:channel).
///
/// Anything Telegram cannot fix by resending is acknowledged with `ok: true`;
/// only database failures return 5xx so the update is redelivered.
async fn telegram_webhook(
    State(state): State<AppState>,
    Path(channel_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // Unknown channels get the same answer as a bad secret.
    let Some(channel) = state
        .config
        .channel(&channel_key)
        .filter(|c| secrets_match(provided, &c.webhook_secret))
    else {
        tracing::warn!(channel = %channel_key, "Rejected webhook call with bad secret");
        return (StatusCode::FORBIDDEN, Json(json!({ "ok": false }))).into_response();
    };

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(channel = %channel.key, error = %e, "Malformed webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "malformed update" })),
            )
                .into_response();
        }
    };

    match ingest_update(&state.db, &state.telegram, channel, update).await {
        Ok(IngestOutcome::Stored { post_id, media_id }) => {
            Json(json!({ "ok": true, "post_id": post_id, "media_id": media_id })).into_response()
        }
        Ok(IngestOutcome::Skipped(reason)) => {
            tracing::debug!(
                channel = %channel.key,
                reason = reason.as_str(),
                "Webhook update skipped"
            );
            Json(json!({ "ok": true, "skipped": reason.as_str() })).into_response()
        }
        Err(e) => {
            tracing::error!(channel = %channel.key, "Failed to store webhook update: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false })),
            )
                .into_response()
        }
    }
}

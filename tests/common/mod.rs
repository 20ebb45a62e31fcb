//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tg_news_relay::config::Config;
use tg_news_relay::db::Database;
use tg_news_relay::translate::TranslationEngine;
use tg_news_relay::web::{create_app, AppState};
use tower::ServiceExt;

/// What the mock engine answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Echo,
    Fail,
}

/// Translation engine double that counts calls.
#[derive(Debug)]
pub struct MockEngine {
    reply: Mutex<Reply>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockEngine {
    pub fn new(reply: Reply) -> Arc<Self> {
        Self::with_delay(reply, Duration::ZERO)
    }

    pub fn with_delay(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationEngine for MockEngine {
    fn provider_tag(&self) -> String {
        "openai:gpt-5-nano".to_string()
    }

    async fn translate(&self, text: &str, _target_lang: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(t) => Ok(Some(t)),
            Reply::Echo => Ok(Some(text.to_string())),
            Reply::Fail => Err(anyhow!("engine unavailable")),
        }
    }
}

pub async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// A router wired to a fresh database and the given engine.
pub async fn setup_app(config: Config, engine: Arc<MockEngine>) -> (Router, Database, TempDir) {
    let (db, temp_dir) = setup_db().await;
    let state = AppState::new(config, db.clone(), engine).expect("Failed to build state");
    (create_app(state), db, temp_dir)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

pub async fn post_webhook(
    app: &Router,
    channel: &str,
    secret: &str,
    update: &Value,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/tg-webhook/{channel}"))
        .header("content-type", "application/json")
        .header("x-telegram-bot-api-secret-token", secret)
        .body(Body::from(update.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

/// A text-only channel post update.
pub fn text_post(message_id: i64, text: &str) -> Value {
    json!({
        "update_id": message_id * 10,
        "channel_post": {
            "message_id": message_id,
            "date": 1_700_000_000 + message_id,
            "chat": {"id": -1_001_234, "username": "memorial_now", "type": "channel"},
            "text": text
        }
    })
}

/// A channel post carrying two photo sizes.
pub fn photo_post(message_id: i64, caption: &str, small: &str, large: &str) -> Value {
    json!({
        "update_id": message_id * 10,
        "channel_post": {
            "message_id": message_id,
            "date": 1_700_000_000 + message_id,
            "chat": {"id": -1_001_234, "username": "memorial_now", "type": "channel"},
            "caption": caption,
            "photo": [
                {"file_id": small, "file_unique_id": format!("u-{small}"), "width": 90, "height": 60},
                {"file_id": large, "file_unique_id": format!("u-{large}"), "width": 1280, "height": 853}
            ]
        }
    })
}

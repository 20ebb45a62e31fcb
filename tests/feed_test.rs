//! Integration tests for the translated feed endpoint.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{get_json, post_webhook, send, setup_app, text_post, MockEngine, Reply};
use tg_news_relay::config::Config;
use tg_news_relay::db::{count_translations_for_post, get_post_by_message, get_translation};

#[tokio::test]
async fn test_source_language_skips_engine() {
    let engine = MockEngine::new(Reply::Text("Привет мир".to_string()));
    let (app, _db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;

    let (status, body) = get_json(&app, "/news2?channel=now&lang=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel"], "now");
    assert_eq!(body["lang"], "en");

    let item = &body["items"][0];
    assert_eq!(item["message_id"], 101);
    assert_eq!(item["text"], "Hello world");
    assert_eq!(item["text_tr"], "Hello world");
    assert_eq!(item["lang_out"], "en");
    assert_eq!(item["provider"], "none");
    assert_eq!(item["link"], "https://t.me/memorial_now/101");
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_english_is_verbatim_for_other_source_language() {
    let engine = MockEngine::new(Reply::Text("Hallo Welt".to_string()));
    let mut config = Config::for_testing();
    config.source_lang = "ru".to_string();
    let (app, db, _tmp) = setup_app(config, engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Привет мир")).await;
    let post = get_post_by_message(db.pool(), "now", 101).await.unwrap().unwrap();

    let (status, body) = get_json(&app, "/news2?channel=now&lang=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["text_tr"], "Привет мир");
    assert_eq!(body["items"][0]["provider"], "none");
    assert_eq!(engine.calls(), 0);

    let (_, body) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(body["items"][0]["provider"], "none");
    assert_eq!(engine.calls(), 0);
    assert_eq!(count_translations_for_post(db.pool(), post.id).await.unwrap(), 0);

    let (_, body) = get_json(&app, "/news2?channel=now&lang=de").await;
    assert_eq!(body["items"][0]["text_tr"], "Hallo Welt");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_translation_is_cached_after_first_read() {
    let engine = MockEngine::new(Reply::Text("Привет мир".to_string()));
    let (app, db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;
    let post = get_post_by_message(db.pool(), "now", 101).await.unwrap().unwrap();

    let (status, body) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["items"][0];
    assert_eq!(item["text"], "Hello world");
    assert_eq!(item["text_tr"], "Привет мир");
    assert_eq!(item["lang_out"], "ru");
    assert_eq!(item["provider"], "openai:gpt-5-nano");
    assert_eq!(engine.calls(), 1);
    assert_eq!(count_translations_for_post(db.pool(), post.id).await.unwrap(), 1);

    let (_, again) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(again["items"][0]["text_tr"], "Привет мир");
    assert_eq!(again["items"][0]["provider"], "openai:gpt-5-nano");
    assert_eq!(engine.calls(), 1);
    assert_eq!(count_translations_for_post(db.pool(), post.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_lang_is_normalized() {
    let engine = MockEngine::new(Reply::Text("Привет мир".to_string()));
    let (app, _db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;

    let (_, body) = get_json(&app, "/news2?channel=now&lang=ru-RU").await;
    assert_eq!(body["lang"], "ru");
    let (_, body) = get_json(&app, "/news2?channel=NOW&lang=RU").await;
    assert_eq!(body["items"][0]["text_tr"], "Привет мир");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_echoed_output_is_not_cached() {
    let engine = MockEngine::new(Reply::Echo);
    let (app, db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;
    let post = get_post_by_message(db.pool(), "now", 101).await.unwrap().unwrap();

    let (status, body) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(status, StatusCode::OK);
    let item = &body["items"][0];
    assert_eq!(item["text_tr"], "Hello world");
    assert_eq!(item["lang_out"], "en");
    assert_eq!(item["provider"], "none");
    assert_eq!(count_translations_for_post(db.pool(), post.id).await.unwrap(), 0);

    // Nothing cached, so the next read tries again.
    get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_engine_failure_serves_source_text() {
    let engine = MockEngine::new(Reply::Fail);
    let (app, db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;
    let post = get_post_by_message(db.pool(), "now", 101).await.unwrap().unwrap();

    let (status, body) = get_json(&app, "/news2?channel=now&lang=de").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["text_tr"], "Hello world");
    assert_eq!(body["items"][0]["provider"], "none");
    assert!(get_translation(db.pool(), post.id, "de").await.unwrap().is_none());

    engine.set_reply(Reply::Text("Hallo Welt".to_string()));
    let (_, body) = get_json(&app, "/news2?channel=now&lang=de").await;
    assert_eq!(body["items"][0]["text_tr"], "Hallo Welt");
}

#[tokio::test]
async fn test_edited_post_regenerates_translation() {
    let engine = MockEngine::new(Reply::Text("Привет мир".to_string()));
    let (app, db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;
    get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(engine.calls(), 1);

    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello brave world")).await;
    engine.set_reply(Reply::Text("Привет, храбрый мир".to_string()));

    let (_, body) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(body["items"][0]["text"], "Hello brave world");
    assert_eq!(body["items"][0]["text_tr"], "Привет, храбрый мир");
    assert_eq!(engine.calls(), 2);

    let post = get_post_by_message(db.pool(), "now", 101).await.unwrap().unwrap();
    assert_eq!(count_translations_for_post(db.pool(), post.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_reads_call_engine_once() {
    let engine = MockEngine::with_delay(
        Reply::Text("Привет мир".to_string()),
        Duration::from_millis(200),
    );
    let (app, _db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(101, "Hello world")).await;

    let (a, b) = tokio::join!(
        get_json(&app, "/news2?channel=now&lang=ru"),
        get_json(&app, "/news2?channel=now&lang=ru"),
    );
    assert_eq!(a.1["items"][0]["text_tr"], "Привет мир");
    assert_eq!(b.1["items"][0]["text_tr"], "Привет мир");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_default_channel_and_lang() {
    let engine = MockEngine::new(Reply::Echo);
    let (app, _db, _tmp) = setup_app(Config::for_testing(), engine.clone()).await;
    post_webhook(&app, "now", "now-secret", &text_post(1, "One")).await;

    let (status, body) = get_json(&app, "/news2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel"], "now");
    assert_eq!(body["lang"], "en");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert!(body["next_before"].is_null());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_invalid_parameters_are_rejected() {
    let (app, _db, _tmp) = setup_app(Config::for_testing(), MockEngine::new(Reply::Echo)).await;

    let (status, _) = get_json(&app, "/news2?channel=missing").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/news2?lang=12").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/news2?before=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_feed() {
    let (app, _db, _tmp) = setup_app(Config::for_testing(), MockEngine::new(Reply::Echo)).await;

    let (status, body) = get_json(&app, "/news2?channel=now&lang=ru").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
    assert!(body["next_before"].is_null());
}

#[tokio::test]
async fn test_feed_rate_limit() {
    let mut config = Config::for_testing();
    config.feed_rate_limit_per_min = 2;
    config.trust_forwarded_for = true;
    let (app, _db, _tmp) = setup_app(config, MockEngine::new(Reply::Echo)).await;

    let request = |forwarded: &str| {
        Request::builder()
            .uri("/news2")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, request("203.0.113.5")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, request("203.0.113.5")).await;
    assert_eq!(status, StatusCode::OK);

    // Rotating a client-supplied leading hop does not reset the count.
    let response = tower::ServiceExt::oneshot(app.clone(), request("9.9.9.9, 203.0.113.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));

    // Other clients are counted separately.
    let (status, _) = send(&app, request("198.51.100.7")).await;
    assert_eq!(status, StatusCode::OK);
}

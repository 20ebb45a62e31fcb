mod admin;
mod auth;
mod rate_limit;
mod routes;
mod webhook;

pub use auth::secrets_match;
pub use rate_limit::{check_rate_limit, RateLimitDecision};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::telegram::TelegramClient;
use crate::translate::{TranslationCache, TranslationEngine};

/// Shared application state, built once per process and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub telegram: TelegramClient,
    pub translations: TranslationCache,
}

impl AppState {
    /// Wire up the services handlers depend on.
    ///
    /// # Errors
    ///
    /// Returns an error if the Telegram HTTP client cannot be built.
    pub fn new(config: Config, db: Database, engine: Arc<dyn TranslationEngine>) -> Result<Self> {
        let telegram = TelegramClient::new(&config).context("Failed to build Telegram client")?;
        let translations = TranslationCache::new(db.clone(), engine, &config.source_lang);

        Ok(Self {
            db,
            config: Arc::new(config),
            telegram,
            translations,
        })
    }
}

/// Start the web server and run until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to bind or crashes.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    // The feed and media proxy are read cross-origin by the static site.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .merge(routes::router())
        .merge(webhook::router())
        .merge(admin::router())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

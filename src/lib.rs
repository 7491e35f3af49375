pub mod adapters;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod rate_limit;
pub mod retry;
pub mod routes;
pub mod session;
pub mod settings;
pub mod state;
pub mod tracker;
pub mod worker;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::adapters::AdapterRegistry;
use crate::config::Config;
use crate::notify::Notifier;
use crate::rate_limit::PlatformRateLimiter;
use crate::retry::RetryPolicy;
use crate::session::SessionFactory;
use crate::settings::PgSettingsStore;
use crate::state::{AppState, SharedState};

pub fn build_app(
    pool: PgPool,
    config: Config,
    sessions: Arc<dyn SessionFactory>,
    notifier: Arc<dyn Notifier>,
) -> (Router, SharedState) {
    let limiter = PlatformRateLimiter::from_config(&config);
    let retry = RetryPolicy::from_config(&config);
    let settings = Arc::new(PgSettingsStore::new(pool.clone()));

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        adapters: AdapterRegistry::standard(),
        limiter,
        retry,
        sessions,
        settings,
        notifier,
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}

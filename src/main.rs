use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use autoapply::config::Config;
use autoapply::notify::{LogNotifier, Notifier, WebhookNotifier};
use autoapply::session::{DisconnectedSessionFactory, HttpSessionFactory, SessionFactory};
use autoapply::worker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting auto-apply engine");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations applied");

    let sessions: Arc<dyn SessionFactory> = match &config.session_base_url {
        Some(url) => Arc::new(HttpSessionFactory::new(url.clone())),
        None => {
            tracing::warn!("AUTOAPPLY_SESSION_URL not set; automation attempts will back off");
            Arc::new(DisconnectedSessionFactory)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let addr = SocketAddr::new(config.host, config.port);
    let worker_count = config.worker_count;
    let (app, state) = autoapply::build_app(pool, config, sessions, notifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = worker::run_pool(state, shutdown_rx, worker_count);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = pool_handle.join();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

//! diacare-server: diabetes care API binary entrypoint.

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diacare_server::config::Config;

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env();

    if let Err(err) = run(config).await {
        tracing::error!(error = %err, "Server failed");
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let pool = diacare_server::db::create_pool(&config.database_url).await?;
    diacare_server::db::migrate(&pool).await?;

    match &config.ml.predict_url {
        Some(url) => tracing::info!(url = %url, retries = config.ml.retry_count, "ML prediction service configured"),
        None => tracing::warn!("ML_PREDICT_URL not set, predictions will fail"),
    }
    tracing::info!(url = %config.ml.service_url, "AI chat relay target");
    if config.auth_tokens.is_empty() {
        tracing::warn!("AUTH_TOKENS is empty, every protected route will answer 401");
    } else {
        tracing::info!(count = config.auth_tokens.len(), "Loaded auth tokens");
    }
    tracing::info!("Rate limiting: {} requests/second", config.rate_limit_rps);

    let app = diacare_server::build_app(pool, &config);

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting DiaCare server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

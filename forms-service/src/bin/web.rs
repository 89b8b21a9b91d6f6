//! Print Hub Web Server - form submission receiver.
//!
//! This binary provides a thin web server that:
//! - Receives contact and quote form submissions
//! - Throttles abusive clients and validates input
//! - Persists each submission to SQLite
//! - Enqueues a notification job to RabbitMQ and returns immediately
//!
//! Email rendering and delivery happen in the notifier worker.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use printhub::ratelimit::{CounterStore, InMemoryCounterStore, RedisCounterStore};
use printhub::web::{health, submit_contact, submit_quote, AppState};
use printhub::{Config, Publisher, RateLimiter, SubmissionStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        database_url = %config.database_url,
        redis_configured = config.redis_url.is_some(),
        "config_loaded"
    );

    // Open the submissions database
    let store = SubmissionStore::connect(&config.database_url)
        .await
        .context("Failed to open submissions database")?;
    info!("submission_store_ready");

    // Rate-limit counter store: Redis when configured, in-memory otherwise
    let counter_store: Arc<dyn CounterStore> = match &config.redis_url {
        Some(url) => match RedisCounterStore::new(url).await {
            Ok(store) => {
                info!("rate_limit_store_redis");
                Arc::new(store)
            }
            Err(e) => {
                warn!(error = %e, "rate_limit_redis_unavailable_falling_back");
                Arc::new(InMemoryCounterStore::new())
            }
        },
        None => {
            info!("rate_limit_store_memory");
            Arc::new(InMemoryCounterStore::new())
        }
    };
    let limiter = RateLimiter::new(counter_store);

    // Create RabbitMQ publisher for notification jobs
    let publisher = Publisher::new(config.cloudamqp_url.clone());
    info!("rabbitmq_publisher_created");

    // Create application state
    let state = AppState::new(store, limiter, Arc::new(publisher.clone()));

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/contact", post(submit_contact))
        .route("/get-quote", post(submit_quote))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown; ConnectInfo feeds the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    // Close publisher connection
    publisher.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}

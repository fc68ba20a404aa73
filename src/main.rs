mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod scoring;
mod services;
mod store;

use axum::{
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::store::PgProfileStore;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool, the profile store
/// adapter, and the HTTP routes with their middleware (CORS, rate limiting,
/// request body limit), then starts the axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_scoring_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Financial summary read cache. Scoring itself is never cached: every
    // scoring call recomputes and persists.
    let summary_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.summary_cache_ttl_secs))
        .max_capacity(10_000)
        .build();
    tracing::info!(
        "Summary cache initialized ({}s TTL, 10k capacity)",
        config.summary_cache_ttl_secs
    );

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        store: Arc::new(PgProfileStore::new(db.pool.clone())),
        config: config.clone(),
        summary_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/v1/credit/score", post(handlers::score_credit))
        .route(
            "/api/v1/credit/score/group",
            post(handlers::score_group_credit),
        )
        .route("/api/v1/credit/summary", get(handlers::financial_summary))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (score requests are tiny)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

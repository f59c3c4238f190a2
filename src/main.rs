//! BookVault Server - library catalog and lending
//!
//! REST API server for book lending with reservations and fines.

use anyhow::Context;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookvault_server::{
    api,
    config::{AppConfig, LoggingConfig},
    models::loan::LendingPolicy,
    repository::Repository,
    services::{redis::RedisService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    let lending_policy =
        LendingPolicy::try_from(config.lending).context("Invalid lending configuration")?;

    tracing::info!("Starting BookVault Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let redis_service = RedisService::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(pool);
    let services = Services::new(
        repository,
        config.auth.clone(),
        config.email.clone(),
        lending_policy,
        redis_service,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// RUST_LOG wins over the configured level; `format = "json"` switches to JSON lines
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookvault_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Account
        .route("/account/register", post(api::account::register))
        .route("/account/verify-otp", post(api::account::verify_otp))
        .route("/account/resend-otp", post(api::account::resend_otp))
        .route("/account/login", post(api::account::login))
        .route("/account/logout", post(api::account::logout))
        .route("/account/me", get(api::account::me))
        // Books (catalog)
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/due-date", get(api::books::due_date))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        // Lending
        .route("/books/:id/copies", post(api::books::update_copies))
        .route("/books/:id/availability", get(api::books::availability))
        .route("/books/:id/borrow", post(api::books::borrow_book))
        .route("/books/:id/reserve", post(api::books::reserve_book))
        .route("/books/:id/return", post(api::books::return_book))
        // Administration
        .route("/admin/users", get(api::admin::list_users))
        .route("/admin/users/:id", patch(api::admin::update_user))
        .route("/admin/fines/assess", post(api::admin::assess_fines))
        .route(
            "/admin/books/:id/fines/:borrower_id",
            delete(api::admin::clear_fine),
        )
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
}

//! Tradeflow Platform - Backend
//!
//! Multi-tenant catalog, inventory and purchase-order service. Companies
//! manage their own product catalogs and stock, and place orders against
//! each other's catalogs.

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;

use external::ExchangeRateProvider;
use services::{Mailer, StockNotifier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub notifier: StockNotifier,
    pub exchange_rates: Arc<dyn ExchangeRateProvider>,
    pub mailer: Mailer,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origin);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origin {
        "*" => cors.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => cors.allow_origin(value),
            Err(_) => {
                tracing::warn!(origin, "invalid CORS origin, allowing any");
                cors.allow_origin(Any)
            }
        },
    }
}

/// Root endpoint
async fn root() -> &'static str {
    "Tradeflow API v1"
}

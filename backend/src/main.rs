//! Tradeflow Platform - Backend Server

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradeflow_backend::{
    create_app,
    external::{CachedExchangeRates, HttpExchangeRateProvider},
    services::{CompanyService, Mailer, StockNotifier},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tradeflow_server=debug,tradeflow_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Tradeflow Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let rate_provider = HttpExchangeRateProvider::new(
        &config.exchange_rate.api_endpoint,
        Duration::from_secs(config.exchange_rate.request_timeout_seconds),
    )?;
    let exchange_rates = CachedExchangeRates::new(
        rate_provider,
        Duration::from_secs(config.exchange_rate.cache_ttl_seconds),
    );
    let mailer = Mailer::from_config(&config.smtp)?;

    let state = AppState {
        db: db_pool.clone(),
        config: Arc::new(config.clone()),
        notifier: StockNotifier::default(),
        exchange_rates: Arc::new(exchange_rates),
        mailer,
    };

    spawn_company_cleanup(db_pool, &config);

    let app = create_app(state);

    let addr = config.bind_address();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically remove companies that were never verified
fn spawn_company_cleanup(db: sqlx::PgPool, config: &Config) {
    let ttl = chrono::Duration::hours(config.company.unverified_ttl_hours);
    let period = Duration::from_secs(config.company.cleanup_interval_seconds.max(1));

    tokio::spawn(async move {
        let service = CompanyService::new(db);
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match service.purge_expired_unverified(ttl).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "purged expired unverified companies"),
                Err(e) => tracing::error!(error = ?e, "company cleanup failed"),
            }
        }
    });
}

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use monetization_service::config::Config;
use monetization_service::routes::configure_routes;
use monetization_service::services::RateService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("🔧 Starting monetization-service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "✅ Configuration loaded: env={}, port={}",
        config.app.env, config.app.port
    );

    // Initialize database pool
    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    // Verify database connection
    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("✅ Database pool created and verified");

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations completed");

    // Initialize Redis connection (optional; stats reads fall back to
    // PostgreSQL without it)
    let redis_conn = match &config.redis.url {
        Some(url) => match redis::Client::open(url.as_str()) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => {
                    info!("✅ Redis connection established");
                    Some(conn)
                }
                Err(e) => {
                    warn!("Redis unavailable, stats cache disabled: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Invalid Redis URL, stats cache disabled: {}", e);
                None
            }
        },
        None => {
            info!("Stats cache disabled: REDIS_URL not set");
            None
        }
    };

    // Load the current earning rate schedule
    let rate_service = Arc::new(
        RateService::load(pg_pool.clone())
            .await
            .context("Failed to load earning rates")?,
    );
    info!("✅ Earning rate schedule loaded");

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    info!("🚀 Starting HTTP server on {}", bind_addr);

    let server_pool = pg_pool.clone();
    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(web::Data::new(server_pool.clone()))
            .app_data(web::Data::from(rate_service.clone()));

        if let Some(conn) = redis_conn.clone() {
            app = app.app_data(web::Data::new(conn));
        }

        app.configure(configure_routes)
    })
    .bind(&bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("🛑 monetization-service shutting down");
    Ok(())
}

//! Storefront Backend Application
//!
//! This is the main entry point for the storefront backend service.
//! The application exposes the catalog, session cart, checkout, account,
//! and assistant chat endpoints over HTTP.
//!
//! # Architecture
//!
//! - Repository layer for data access (Postgres)
//! - Service layer for business logic (cart, checkout, assistant, auth)
//! - Session layer for per-visitor cart state
//! - API layer for HTTP endpoints
//! - Metrics for monitoring

use anyhow::{Context, Result};
use app_config::AppConfig;
use server::{AppState, Server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Storefront backend starting...");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db_pool = match db::init_db_pool(&config).await {
        Ok(pool) => {
            info!("Database initialized successfully");
            pool
        }
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return Err(e.context("Failed to initialize database"));
        }
    };

    let state = AppState::build(db_pool, &config).context("Failed to build application state")?;

    let http_port = config.http_port.to_string();
    info!("Using HTTP port: {}", http_port);

    let http_server = Server::new(http_port, state);
    http_server.start().await?;

    info!("Application stopped");
    Ok(())
}

mod app;
mod auth;
mod error;
mod expenses;
mod health;
mod rules;
mod state;
mod users;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use expensa_core::config::{AppConfig, LoadOptions};
use expensa_core::notify::TracingNotifier;

fn init_logging(config: &AppConfig) {
    use expensa_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let pool = expensa_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await?;
    expensa_db::migrations::run_pending(&pool).await?;

    health::spawn(&config.server.bind_address, config.server.health_check_port, pool.clone())
        .await?;

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let shutdown_grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    let state = state::AppState::with_pool(config, pool.clone(), Arc::new(TracingNotifier));

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "expensa-server started"
    );

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(event_name = "system.server.stopping", "expensa-server stopping");

    // Give in-flight transactions a bounded window to finish.
    tokio::time::timeout(shutdown_grace, pool.close()).await.ok();

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
    }
}

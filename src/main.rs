use anyhow::{Context, Result};
use firecoord::api::{create_router, ApiState};
use firecoord::config::{load_config, FirecoordConfig};
use firecoord::simulation::Simulation;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "firecoord=info".into()),
        )
        .init();

    info!("Firecoord starting...");

    let mut config = match std::env::var("FIRECOORD_CONFIG") {
        Ok(path) => {
            let config = load_config(&path)?;
            info!(path = %path, "Configuration loaded");
            config
        }
        Err(_) => {
            info!("FIRECOORD_CONFIG not set, using defaults");
            FirecoordConfig::default()
        }
    };
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    info!(
        grid_rows = config.simulation.grid_rows,
        grid_cols = config.simulation.grid_cols,
        tick_interval_ms = config.simulation.tick_interval_ms,
        negotiation_timeout_ticks = config.broker.negotiation_timeout_ticks,
        stations = config.stations.len(),
        seed = ?config.simulation.seed,
        "Configuration ready"
    );

    let simulation = Simulation::start(&config);

    // Start HTTP API server
    let server_handle = if config.api.enabled {
        let router = create_router(Arc::new(ApiState::from_simulation(&simulation)));
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
            .await
            .context("Failed to bind API port")?;
        info!(port = config.api.port, "API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "API server error");
            }
        }))
    } else {
        warn!("API disabled, simulation observable through logs only");
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    if let Some(handle) = server_handle {
        handle.abort();
    }
    simulation.shutdown().await;
    info!("Firecoord stopped");

    Ok(())
}

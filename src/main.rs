use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod config;
mod dashboard;
mod engine;
mod ensemble;
mod error;
mod models;
mod normalize;
mod portfolio;
mod ranking;
mod sources;

use config::{Config, DataMode};
use dashboard::AppState;
use engine::Engine;
use sources::catalog::default_descriptors;
use sources::{ConnectorSettings, ModeFetcherFactory, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let mode = config.data_mode();
    match mode {
        DataMode::Demo => warn!(
            "DEMO mode: no provider credentials in use (data source '{:?}'), every source serves deterministic synthetic payloads",
            config.data_source
        ),
        DataMode::Hybrid => info!("HYBRID mode: authenticated sources without a key fall back to synthetic payloads"),
        DataMode::Live => info!("LIVE mode: every source talks to its provider"),
    }

    let settings = ConnectorSettings::from_config(&config);
    let factory = ModeFetcherFactory::new(mode, config.credentials(), settings.timeout)?;
    let registry = Arc::new(Registry::new(settings, Arc::new(factory)));

    let engine_settings = config.engine_settings();
    let descriptors = default_descriptors(engine_settings.sports);
    info!(
        "Registering {} sources (sports: {}, strategy: {:?}, portfolio: {:?})",
        descriptors.len(),
        engine_settings.sports,
        engine_settings.strategy,
        engine_settings.portfolio_size
    );
    registry.initialize_all(descriptors).await;

    let engine = Engine::new(engine_settings);
    let first = engine.run_cycle(&registry).await;

    if config.once {
        let json = serde_json::to_string_pretty(&first).context("Failed to serialize engine output")?;
        println!("{}", json);
        registry.dispose_all().await;
        return Ok(());
    }

    let output: dashboard::SharedOutput = Arc::new(RwLock::new(Some(first)));

    // Re-run the engine after every applied background refresh
    let mut updates = registry.subscribe();
    registry
        .start_background_refresh(Duration::from_secs(config.refresh_interval_secs))
        .await;
    let cycle_registry = registry.clone();
    let cycle_output = output.clone();
    let cycle_task = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let out = engine.run_cycle(&cycle_registry).await;
            *cycle_output.write().await = Some(out);
        }
    });

    let app = dashboard::router(AppState {
        output: output.clone(),
        mode,
    });
    let addr: SocketAddr = config
        .dashboard_addr
        .parse()
        .with_context(|| format!("Invalid dashboard address '{}'", config.dashboard_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Dashboard listening on http://{}", addr);

    tokio::select! {
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                error!("Dashboard server failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    cycle_task.abort();
    registry.dispose_all().await;
    Ok(())
}

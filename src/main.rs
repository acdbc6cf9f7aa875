use crate::app_config::AppConfig;
use crate::auth::EnlightenIssuer;
use crate::control_listener::control_listener;
use crate::domain::Notification;
use crate::envoy::new_client;
use crate::notification_listener::notification_listener;
use crate::poll::Engine;
use crate::store_listener::store_listener;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{BufReader, stdin};
use tokio::sync::mpsc;
use tokio::task;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_config;
mod auth;
mod control_listener;
mod domain;
mod envoy;
mod extensions;
mod lock_table;
mod notification_listener;
mod persistence;
mod poll;
mod scheduler;
mod store;
mod store_listener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Arc::new(AppConfig::load()?);
    info!("✅  Loaded configuration");

    let gateway = new_client(config.envoy().request_timeout())?;
    let cloud = reqwest::Client::builder()
        .cookie_store(true)
        .timeout(config.envoy().request_timeout())
        .build()?;
    let enlighten = config.enlighten();
    let issuer = Arc::new(EnlightenIssuer::new(
        cloud,
        enlighten.login_url().to_string(),
        enlighten.token_url().to_string(),
        enlighten.user().to_string(),
        enlighten.password().clone(),
    ));

    let (tx, rx) = mpsc::channel::<Notification>(config.core().notification_buffer_size());
    task::spawn(async move {
        notification_listener(rx).await;
    });
    info!("✅  Initialized notification listener");

    let engine = Arc::new(Engine::new(config.clone(), gateway, issuer, tx));
    let snapshots = engine.subscribe();
    task::spawn(async move {
        store_listener(snapshots).await;
    });
    info!("✅  Initialized store listener");

    let strategy = ExponentialBackoff::from_millis(2)
        .factor(1000)
        .max_delay(Duration::from_secs(300))
        .map(jitter);
    let connecting = &engine;
    Retry::start(strategy, || async move {
        connecting
            .connect()
            .await
            .inspect_err(|e| warn!("⚠️ Connecting... failed, {}. Retrying...", e))
    })
    .await
    .inspect_err(|e| error!("❌ Could not connect to the gateway: {}", e))?;

    let capabilities = engine.capabilities().await;
    info!(
        pcus = capabilities.pcus.count,
        meters = capabilities.meters.config.count,
        ensemble = capabilities.ensemble.inventory.is_proven(),
        token = ?engine.token_state(),
        "✅  Discovered the gateway"
    );

    task::spawn(engine.clone().run());

    let controlled = engine.clone();
    task::spawn(async move {
        control_listener(controlled, BufReader::new(stdin())).await;
    });
    info!("✅  Initialized control listener");
    info!("🔥 {} is up and running", env!("CARGO_PKG_NAME"));

    tokio::signal::ctrl_c().await?;
    info!("👋 Shutting down");
    engine.stop();

    Ok(())
}

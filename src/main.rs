//! wireless-tag-bridge - Wireless Sensor Tag home-automation bridge
//!
//! Polls the Wireless Sensor Tag cloud API for every configured tag manager
//! and republishes each tag's temperature as an accessory characteristic.

mod accessory;
mod bridge;
mod config;
mod error;
mod models;
mod wirelesstag;

use std::net::SocketAddr;
use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::accessory::Reconciler;
use crate::bridge::api::{self, ApiState};
use crate::bridge::LocalBridge;
use crate::wirelesstag::{Poller, TagListClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wireless_tag_bridge=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting wireless-tag-bridge...");

    // Load configuration (missing token is fatal)
    let config = config::Config::load()?;
    tracing::info!("Configuration loaded: {}", config.describe());
    if config.tag_managers.is_empty() {
        tracing::warn!("No tagManagers configured; polling will find nothing");
    }

    let interval = config.poll_interval();

    // Host + accessory cache
    let bridge = Arc::new(LocalBridge::new());
    let reconciler = Arc::new(Reconciler::new(bridge.clone()));

    let mut restored = 0usize;
    for accessory in bridge.accessories().await {
        if reconciler.restore(accessory).await {
            restored += 1;
        }
    }
    tracing::info!("Accessory cache ready ({} restored from host)", restored);

    // Tag list client + poller
    let client = Arc::new(TagListClient::new(&config.api, &config.token)?);
    tracing::info!("Tag list endpoint: {}", client.url());

    let poller = Arc::new(Poller::new(
        client,
        reconciler.clone(),
        config.tag_managers.clone().into_vec(),
        interval,
    ));

    start_background_tasks(bridge, poller.clone());

    if !config.server.enabled {
        tracing::info!("Status API disabled; running until Ctrl-C");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down");
        return Ok(());
    }

    // Build status API
    let app = api::routes(ApiState { reconciler, poller }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Status API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Start background tasks (poller, characteristic event logger)
fn start_background_tasks(bridge: Arc<LocalBridge>, poller: Arc<Poller<LocalBridge>>) {
    tokio::spawn(async move {
        bridge.log_events().await;
    });

    tokio::spawn(async move {
        poller.run().await;
    });

    tracing::info!("Background tasks started");
}

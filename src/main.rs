//! foobar2000 bridge
//!
//! Polls a foobar2000 player and serves it over HTTP.

use foobar_bridge::adapters::actions::build_action;
use foobar_bridge::adapters::{FoobarAdapter, HttpRemote, PlayerSettings, Startable};
use foobar_bridge::bus::BusEvent;
use foobar_bridge::{api, bus, config};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foobar_bridge=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting foobar2000 bridge v{} ({})",
        env!("FBB_VERSION"),
        env!("FBB_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    let foobar_config = config.foobar()?;
    tracing::info!(
        "Configuration loaded, port: {}, player: {}:{}",
        config.port,
        foobar_config.host,
        foobar_config.port
    );

    // Create event bus
    let bus = bus::create_bus();

    // Power actions share one HTTP client
    let http = reqwest::Client::new();
    let settings = PlayerSettings {
        name: foobar_config.name.clone(),
        volume_step: foobar_config.volume_step,
        poll_interval: config.poll_interval(),
        turn_on_action: foobar_config
            .turn_on_action
            .as_ref()
            .map(|action| build_action(action, &http)),
        turn_off_action: foobar_config
            .turn_off_action
            .as_ref()
            .map(|action| build_action(action, &http)),
    };

    let remote = HttpRemote::new(foobar_config.remote_settings())?;
    tracing::info!("foo_httpcontrol endpoint: {}", remote.endpoint());

    let player = Arc::new(FoobarAdapter::new(Arc::new(remote), settings, bus.clone()));
    if let Err(e) = player.start().await {
        tracing::warn!("Failed to start foobar adapter: {}", e);
    } else {
        tracing::info!("foobar adapter started for {}", foobar_config.host);
    }

    let state = api::AppState::new(player.clone(), bus.clone());

    // API routes plus middleware
    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: stop adapters
    tracing::info!("Shutting down adapters...");
    bus.publish(BusEvent::ShuttingDown {
        reason: Some("signal".to_string()),
    });
    player.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

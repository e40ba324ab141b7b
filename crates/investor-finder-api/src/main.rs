use anyhow::Result;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{info, warn};

use investor_finder_api::config::Settings;
use investor_finder_api::utils::logger::init_logger;
use investor_finder_api::{build_router, build_state, spawn_maintenance};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging; the guard flushes the file writer on drop
    let _log_guard = init_logger(&settings.logging)?;

    info!("🚀 Starting {}...", settings.server.app_name);
    info!("✅ Configuration loaded");

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = build_state(settings).await?;
    let registry = state.registry.clone();
    info!("✅ Services initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = spawn_maintenance(&state, shutdown_rx);

    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = maintenance.await {
        warn!("Maintenance task ended abnormally: {}", e);
    }

    let closed = registry.shutdown_all().await;
    info!("👋 Shut down {} provider instance(s)", closed);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#![doc = include_str!("../README.md")]

mod server;

use axum::Router;
use clap::Parser;
use filemq::{IdGenerator, Store};
use server::config::{CliArgs, ServerConfig};
use server::service::{
    handler::{FileMqService, dispatch},
    routes::build_router,
    sweeper::spawn_sweeper,
};
use server::telemetry::{TelemetryProviders, init_telemetry};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let store = Arc::new(Store::open(config.store.clone())?);
    let ids = IdGenerator::with_mode(config.id_mode)?;
    let router = build_router()?;
    let service = FileMqService::new(Arc::clone(&store), ids, router);

    let sweep_token = CancellationToken::new();
    let sweeper = config
        .sweep
        .map(|sweep| spawn_sweeper(Arc::clone(&store), sweep, sweep_token.clone()));

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    let app = Router::new().fallback(dispatch).with_state(service);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_token.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            tracing::error!("Sweeper did not stop cleanly: {e}");
        }
    }

    shutdown(&store, &providers).await;
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting queue service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting queue service on {} with {} workers per pool",
            config.server_addr,
            config.store.workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}

async fn shutdown(store: &Store, providers: &TelemetryProviders) {
    if let Err(e) = store.shutdown().await {
        tracing::error!("Error during store shutdown: {e:?}");
    }

    let stats = store.stats();
    tracing::info!(
        saved = stats.saved,
        save_failures = stats.save_failures,
        delivered = stats.delivered,
        empty = stats.empty,
        races_lost = stats.races_lost,
        duplicate_deliveries = stats.duplicate_deliveries,
        unreadable = stats.unreadable,
        "Service shut down successfully"
    );

    providers.shutdown();
}

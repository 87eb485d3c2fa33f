//! docshift server - runs pending migrations and reports readiness.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docshift_core::SledStore;
use docshift_server::{run_migrations, serve, Args, HealthState, Outcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docshift_server=info,docshift_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting docshift server");

    let args = Args::parse();
    let config = args.into_config();
    config.validate()?;

    tracing::info!(
        data_path = %config.data_path.display(),
        listen = ?config.listen_address,
        batch_size = config.migration.batch_size,
        index_wait_attempts = config.migration.index_wait.attempts,
        "configuration loaded"
    );

    let store = Arc::new(SledStore::open(config.store_config())?);
    if store.was_recovered() {
        tracing::info!("store recovered from previous run");
    }

    // Set up graceful shutdown
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut migration_rx = shutdown_tx.subscribe();
    let mut http_rx = shutdown_tx.subscribe();
    let mut idle_rx = shutdown_tx.subscribe();

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = signal_tx.send(());
    });

    let health = HealthState::new();
    let http = match &config.listen_address {
        Some(address) => {
            let listener = tokio::net::TcpListener::bind(address).await?;
            tracing::info!(address = %address, "health endpoints listening");
            let state = health.clone();
            Some(tokio::spawn(serve(listener, state, async move {
                let _ = http_rx.recv().await;
            })))
        }
        None => None,
    };

    let outcome = run_migrations(
        store.clone(),
        config.migration.clone(),
        health.clone(),
        async move {
            let _ = migration_rx.recv().await;
        },
    )
    .await;
    store.flush()?;

    match outcome {
        Ok(Outcome::Completed(_)) => {}
        Ok(Outcome::Interrupted) => {
            tracing::info!("shutdown during migrations");
        }
        Err(e) if http.is_none() => return Err(e.into()),
        Err(_) => {
            tracing::warn!("serving in maintenance mode until shutdown");
        }
    }

    if let Some(server) = http {
        let _ = idle_rx.recv().await;
        match server.await {
            Ok(Ok(())) => tracing::info!("server shutdown complete"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "server error");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

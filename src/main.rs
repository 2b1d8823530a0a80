use std::sync::Arc;

use linkedin_scheduler::config::{PublisherConfig, SchedulerConfig};
use linkedin_scheduler::dispatch::{Dispatcher, spawn_dispatcher};
use linkedin_scheduler::publisher::{EnvCredentials, LinkedInPublisherSource};
use linkedin_scheduler::store::{JobStore, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = SchedulerConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!("📅 LinkedIn Scheduler v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn JobStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    // ── Publisher ────────────────────────────────────────────────────────
    // Credentials are read per cycle, so a missing token is not fatal here.
    let publisher_config = PublisherConfig::from_env(config.publish_timeout);
    eprintln!("   API: {}", publisher_config.api_base);
    let source = Arc::new(LinkedInPublisherSource::new(
        publisher_config,
        Arc::new(EnvCredentials),
    )?);

    // ── Dispatcher ───────────────────────────────────────────────────────
    let dispatcher = Dispatcher::new(store, source, config.poll_interval);
    let (handle, shutdown_tx) = spawn_dispatcher(dispatcher);

    shutdown_signal().await;
    tracing::info!("Shutdown requested, finishing current cycle");
    let _ = shutdown_tx.send(true);

    handle.await?;
    eprintln!("Scheduler stopped.");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

//! Stratus service entry point.
//!
//! Loads configuration, wires the PostgreSQL store, the directory client and
//! the audit sinks into the user sync scheduler, and runs until SIGINT or
//! SIGTERM. On unix, SIGHUP requests an immediate sync.

mod config;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use stratus_audit::{AuditSink, FanoutAuditSink, TracingAuditSink};
use stratus_core::CorrelationId;
use stratus_db::{run_migrations, PgAuditSink, PgStateStore};
use stratus_directory::HttpDirectoryClient;
use stratus_usersync::{UsersyncScheduler, UsersyncTrigger, Usersyncer};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;

/// Upper bound for an in-flight sync to observe shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.rust_log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        tenant_domain = %config.usersync.tenant_domain,
        usersync_enabled = config.usersync.enabled,
        "Starting stratus"
    );

    let store =
        match PgStateStore::connect(&config.database_url, config.database_max_connections).await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "Failed to connect to database");
                std::process::exit(1);
            }
        };
    info!("Database connection established");

    if let Err(e) = run_migrations(store.pool()).await {
        error!(error = %e, "Failed to run database migrations");
        std::process::exit(1);
    }

    let sinks: Vec<Arc<dyn AuditSink>> = vec![
        Arc::new(PgAuditSink::new(store.pool().clone())),
        Arc::new(TracingAuditSink),
    ];
    let audit: Arc<dyn AuditSink> = Arc::new(FanoutAuditSink::new(sinks));

    let shutdown = CancellationToken::new();
    let (scheduler, trigger) = match config.directory.clone() {
        Some(directory) if config.usersync.enabled => {
            let directory = match HttpDirectoryClient::new(directory) {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "Failed to build directory client");
                    std::process::exit(1);
                }
            };
            let syncer = Usersyncer::new(
                Arc::new(store),
                Arc::new(directory),
                audit,
                config.usersync.clone(),
            );
            UsersyncScheduler::new(Arc::new(syncer), shutdown.clone())
        }
        _ => UsersyncScheduler::disabled(shutdown.clone()),
    };

    let scheduler = tokio::spawn(scheduler.run());
    let hangups = tokio::spawn(forward_hangups(trigger, shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, scheduler).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Sync scheduler task failed"),
        Err(_) => warn!("Sync scheduler did not stop in time"),
    }
    hangups.abort();

    info!("Server shutdown complete");
}

/// Turn SIGHUP into on-demand sync requests until shutdown.
#[cfg(unix)]
async fn forward_hangups(trigger: UsersyncTrigger, shutdown: CancellationToken) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(sig) => sig,
        Err(e) => {
            error!("Failed to install SIGHUP handler: {e}");
            return;
        }
    };

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                let correlation_id = CorrelationId::new();
                info!(%correlation_id, "Received SIGHUP, requesting user sync");
                if let Err(e) = trigger.request_sync(correlation_id).await {
                    warn!(error = %e, "Could not request user sync");
                    break;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn forward_hangups(trigger: UsersyncTrigger, shutdown: CancellationToken) {
    shutdown.cancelled().await;
    drop(trigger);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

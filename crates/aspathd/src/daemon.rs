//! Daemon mode — reconciles schedules, runs the beat loop and serves the
//! REST API.
//!
//! Startup order:
//! 1. Open the snapshot store
//! 2. Rebuild the schedule registry from config (bounded by a timeout)
//! 3. Start the beat loop, if an ingestion worker is configured
//! 4. Serve the REST API until Ctrl-C

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use aspath_core::AspathConfig;
use aspath_scheduler::{
    Beat, CommandIngestion, IngestionTask, RedbScheduleRegistry, Reconciler, ScheduleRegistry,
};
use aspath_state::StateStore;

fn open_store(config: &AspathConfig) -> anyhow::Result<StateStore> {
    let data_dir = &config.server.data_dir;
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("aspath.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "snapshot store opened");
    Ok(store)
}

/// Rebuild the registry from `config`. Failures and timeouts are logged and
/// returned; the caller decides whether they are fatal.
async fn reconcile(
    registry: Arc<dyn ScheduleRegistry>,
    config: &AspathConfig,
) -> anyhow::Result<()> {
    let grabbers = config.grabbers.clone();
    let timeout = config.scheduler.startup_timeout();
    let job = tokio::task::spawn_blocking(move || {
        let mut reconciler = Reconciler::new(registry);
        reconciler.reconcile(&grabbers).map(|entries| entries.len())
    });

    match tokio::time::timeout(timeout, job).await {
        Ok(Ok(Ok(entries))) => {
            info!(entries, "schedule registry reconciled");
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "schedule reconciliation failed");
            Err(e.into())
        }
        Ok(Err(e)) => {
            error!(error = %e, "schedule reconciliation panicked");
            Err(e.into())
        }
        Err(_) => {
            error!(timeout_secs = timeout.as_secs(), "schedule reconciliation timed out");
            anyhow::bail!("schedule reconciliation timed out after {timeout:?}")
        }
    }
}

/// `aspathd reconcile`: rebuild the registry and exit. Failure is fatal here.
pub async fn reconcile_only(config: AspathConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let registry: Arc<dyn ScheduleRegistry> = Arc::new(RedbScheduleRegistry::new(store));
    reconcile(registry, &config).await
}

/// `aspathd serve`.
pub async fn serve(config: AspathConfig) -> anyhow::Result<()> {
    info!("ASPATH daemon starting");

    let store = open_store(&config)?;
    let registry: Arc<dyn ScheduleRegistry> =
        Arc::new(RedbScheduleRegistry::new(store.clone()));

    // Reads are still served when the schedule cannot be rebuilt.
    if let Err(e) = reconcile(Arc::clone(&registry), &config).await {
        warn!(error = %e, "continuing with a partially reconciled schedule registry");
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Beat loop ──────────────────────────────────────────────

    let beat_handle = match &config.worker {
        Some(worker) => {
            let task: Arc<dyn IngestionTask> = Arc::new(CommandIngestion::new(worker));
            let beat = Beat::new(Arc::clone(&registry), task, config.scheduler.tick());
            info!(command = %worker.command, "beat loop initialized");
            Some(tokio::spawn(async move {
                beat.run(shutdown_rx).await;
            }))
        }
        None => {
            warn!("no [worker] configured, scheduled grabs will not run");
            None
        }
    };

    // ── API server ─────────────────────────────────────────────

    let router = aspath_api::build_router(store, registry, config.request_timeout());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    if let Some(handle) = beat_handle {
        let _ = handle.await;
    }

    info!("ASPATH daemon stopped");
    Ok(())
}

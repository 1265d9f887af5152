use std::time::Duration;

use miette::{Context as _, IntoDiagnostic};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{filter::Targets, prelude::*};

use argus::prelude::*;

use crate::LoggingConfig;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.max_level.unwrap_or(tracing::Level::INFO);

    let mut filter = Targets::new()
        .with_target("argus", level)
        .with_target("argus_core", level)
        .with_target("argus_redb", level)
        .with_target("argus_rpc", level);

    if config.include_gasket {
        filter = filter.with_target("gasket", level);
    }

    if config.include_rpc {
        filter = filter
            .with_target("jsonrpsee-server", level)
            .with_target("tower_http", level);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

pub fn open_store(config: &crate::Config) -> Result<argus_redb::LedgerStore, Error> {
    let network = Network::new(&config.network_passphrase);

    match &config.storage.path {
        Some(root) => {
            std::fs::create_dir_all(root)?;

            let store =
                argus_redb::LedgerStore::open(root.join("ledger"), config.storage.cache, network)
                    .map_err(StoreError::from)?;

            Ok(store)
        }
        None => {
            let store = argus_redb::LedgerStore::in_memory(network)?;

            Ok(store)
        }
    }
}

/// Brings every derived table up to date before readers or the pipeline
/// start. A failed migration aborts startup.
pub fn run_migrations(
    store: &argus_redb::LedgerStore,
    config: &crate::Config,
) -> miette::Result<()> {
    let mut migrations: Vec<Box<dyn Migration<argus_redb::LedgerStore>>> = vec![
        Box::new(TransactionIndexMigration {
            retention_window: config.storage.retention_window,
        }),
        Box::new(EventIndexMigration {
            retention_window: config.storage.retention_window,
        }),
    ];

    run_pending(store, &mut migrations)
        .into_diagnostic()
        .context("running storage migrations")
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => info!("interrupt received"),
                _ = sigterm.recv() => info!("terminate signal received"),
            }
        }
        Err(err) => {
            warn!(%err, "could not install terminate handler");
            let _ = ctrl_c.await;
            info!("interrupt received");
        }
    }
}

#[cfg(windows)]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("interrupt received");
}

/// Token cancelled by the first shutdown signal. The pipeline supervisor
/// and the rpc driver both share it.
pub fn exit_on_signal() -> CancellationToken {
    let exit = CancellationToken::new();

    let trigger = exit.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    exit
}

const SUPERVISION_INTERVAL: Duration = Duration::from_secs(10);

/// Watches the sync pipeline until its stages stop on their own or the
/// exit token fires, reporting the ingest position while it runs.
pub async fn supervise_pipeline(
    pipeline: gasket::daemon::Daemon,
    store: argus_redb::LedgerStore,
    exit: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SUPERVISION_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if pipeline.should_stop() {
                    // stages are done or dismissed; take the rest of the
                    // process down with them
                    exit.cancel();
                    break;
                }

                match store.latest_ledger() {
                    Ok(Some(sequence)) => debug!(sequence, "ingest position"),
                    Ok(None) => debug!("waiting for first ledger from upstream"),
                    Err(err) => {
                        warn!(err = %StoreError::from(err), "ingest position unavailable")
                    }
                }
            }
            _ = exit.cancelled() => break,
        }
    }

    debug!("tearing down sync pipeline");
    pipeline.teardown();
}

pub fn spawn_rpc(
    config: &crate::Config,
    store: argus_redb::LedgerStore,
    exit: CancellationToken,
) -> tokio::task::JoinHandle<Result<(), ServeError>> {
    let driver_config = argus_rpc::DriverConfig {
        rpc: config.rpc.clone(),
        retention_window: config.storage.retention_window,
    };

    tokio::spawn(
        <argus_rpc::Driver as Driver<argus_redb::LedgerStore, CancelTokenImpl>>::run(
            driver_config,
            store,
            CancelTokenImpl(exit),
        ),
    )
}

pub async fn wait_rpc(
    handle: tokio::task::JoinHandle<Result<(), ServeError>>,
    exit: &CancellationToken,
) {
    if let Err(e) = handle.await.unwrap() {
        tracing::error!("rpc driver error: {e}");

        warn!("cancelling remaining tasks");
        exit.cancel();
    }
}

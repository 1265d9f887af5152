use miette::{Context as _, IntoDiagnostic};

use argus::prelude::*;

#[derive(Debug, clap::Args)]
pub struct Args {}

#[tokio::main]
pub async fn run(config: super::Config, _args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let store = crate::common::open_store(&config)
        .into_diagnostic()
        .context("opening ledger store")?;

    crate::common::run_migrations(&store, &config)?;

    let exit = crate::common::exit_on_signal();

    let network = Network::new(&config.network_passphrase);

    let sync = argus::sync::pipeline(
        &config.upstream,
        store.clone(),
        network,
        config.storage.retention_window,
        &config.retries,
    )
    .into_diagnostic()
    .context("bootstrapping sync pipeline")?;

    crate::common::supervise_pipeline(sync, store, exit).await;

    Ok(())
}

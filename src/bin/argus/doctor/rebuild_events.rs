use miette::{Context as _, IntoDiagnostic};
use tracing::info;

use argus::prelude::*;

#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn run(config: &crate::Config, _args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let store = crate::common::open_store(config)
        .into_diagnostic()
        .context("opening ledger store")?;

    info!("dropping event index");

    store
        .clear_event_index()
        .map_err(StoreError::from)
        .into_diagnostic()
        .context("clearing event index")?;

    let mut migrations: Vec<Box<dyn Migration<argus_redb::LedgerStore>>> =
        vec![Box::new(EventIndexMigration {
            retention_window: config.storage.retention_window,
        })];

    run_pending(&store, &mut migrations)
        .into_diagnostic()
        .context("replaying event index migration")?;

    info!("event index rebuilt");

    Ok(())
}

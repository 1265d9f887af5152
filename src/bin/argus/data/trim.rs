use miette::{Context as _, IntoDiagnostic};

#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn run(config: &crate::Config, _args: &Args) -> miette::Result<()> {
    let store = crate::common::open_store(config)
        .into_diagnostic()
        .context("opening ledger store")?;

    let latest = store
        .latest_ledger()
        .map_err(argus_core::StoreError::from)
        .into_diagnostic()
        .context("reading latest ledger")?;

    let Some(latest) = latest else {
        println!("store is empty, nothing to trim");
        return Ok(());
    };

    let window = config.storage.retention_window;

    if latest + 1 <= window {
        println!("retention window not reached yet, nothing to trim");
        return Ok(());
    }

    let cutoff = latest + 1 - window;

    store
        .trim_before(cutoff)
        .map_err(argus_core::StoreError::from)
        .into_diagnostic()
        .context("trimming store")?;

    println!("trimmed ledgers below {cutoff}");

    Ok(())
}

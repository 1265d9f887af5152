use miette::{Context as _, IntoDiagnostic};

#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn run(config: &crate::Config, _args: &Args) -> miette::Result<()> {
    let store = crate::common::open_store(config)
        .into_diagnostic()
        .context("opening ledger store")?;

    let bounds = store
        .bounds()
        .map_err(argus_core::StoreError::from)
        .into_diagnostic()
        .context("reading store bounds")?;

    match bounds {
        Some(bounds) => {
            println!(
                "oldest ledger: {} (close time {})",
                bounds.oldest.sequence, bounds.oldest.close_time
            );
            println!(
                "latest ledger: {} (close time {})",
                bounds.latest.sequence, bounds.latest.close_time
            );
        }
        None => println!("store is empty"),
    }

    let stats = store
        .stats()
        .map_err(argus_core::StoreError::from)
        .into_diagnostic()
        .context("reading store stats")?;

    println!("ledgers: {}", stats.ledgers);
    println!("transactions: {}", stats.transactions);
    println!("events: {}", stats.events);

    Ok(())
}

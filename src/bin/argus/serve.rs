use miette::{Context as _, IntoDiagnostic};

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

    let rpc = crate::common::spawn_rpc(&config, store, exit.clone());

    crate::common::wait_rpc(rpc, &exit).await;

    Ok(())
}

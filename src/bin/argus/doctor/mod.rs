use clap::Subcommand;

mod rebuild_events;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drops the event index and rebuilds it from the ledger store.
    RebuildEvents(rebuild_events::Args),
}

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

pub fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    match &args.command {
        Command::RebuildEvents(x) => rebuild_events::run(config, x),
    }
}

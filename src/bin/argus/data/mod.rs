use clap::Subcommand;

mod summary;
mod trim;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prints store bounds and row counts.
    Summary(summary::Args),
    /// Applies the retention cutoff once, outside the pipeline.
    Trim(trim::Args),
}

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

pub fn run(config: &crate::Config, args: &Args) -> miette::Result<()> {
    match &args.command {
        Command::Summary(x) => summary::run(config, x),
        Command::Trim(x) => trim::run(config, x),
    }
}

use clap::{Parser, Subcommand};
use miette::{Context as _, IntoDiagnostic, Result};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use std::path::PathBuf;

mod common;
mod daemon;
mod data;
mod doctor;
mod serve;
mod sync;

#[derive(Debug, Subcommand)]
enum Command {
    Daemon(daemon::Args),
    Sync(sync::Args),
    Serve(serve::Args),
    Data(data::Args),
    Doctor(doctor::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "Argus")]
#[clap(bin_name = "argus")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    config: Option<PathBuf>,
}

#[serde_as]
#[derive(Deserialize, Default, Debug)]
pub struct LoggingConfig {
    #[serde_as(as = "Option<DisplayFromStr>")]
    max_level: Option<tracing::Level>,

    #[serde(default)]
    include_gasket: bool,

    #[serde(default)]
    include_rpc: bool,
}

#[derive(Deserialize)]
pub struct Config {
    pub network_passphrase: String,
    pub upstream: argus_core::config::UpstreamConfig,
    pub storage: argus_core::config::StorageConfig,
    #[serde(default)]
    pub rpc: argus_core::config::RpcConfig,
    pub retries: Option<gasket::retries::Policy>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(explicit_file: &Option<PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        // our base config will always be in /etc/argus
        s = s.add_source(config::File::with_name("/etc/argus/daemon.toml").required(false));

        // but we can override it by having a file in the working dir
        s = s.add_source(config::File::with_name("argus.toml").required(false));

        // if an explicit file was passed, then we load it as mandatory
        if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        // finally, we use env vars to make some last-step overrides
        s = s.add_source(config::Environment::with_prefix("ARGUS").separator("_"));

        s.build()?.try_deserialize()
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::new(&args.config)
        .into_diagnostic()
        .context("parsing configuration")?;

    match args.command {
        Command::Daemon(x) => daemon::run(config, &x)?,
        Command::Sync(x) => sync::run(config, &x)?,
        Command::Serve(x) => serve::run(config, &x)?,
        Command::Data(x) => data::run(&config, &x)?,
        Command::Doctor(x) => doctor::run(&config, &x)?,
    };

    Ok(())
}

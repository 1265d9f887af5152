use argus_core::config::UpstreamConfig;

use crate::prelude::*;

pub mod emulator;
pub mod node;

/// Push stream of closed-ledger records produced by an upstream consensus
/// node. The pipeline treats it as an opaque iterator: it only ever asks for
/// the next record.
#[async_trait::async_trait]
pub trait LedgerSource: Send {
    async fn next_ledger(&mut self) -> Result<RawLedger, Error>;
}

pub async fn from_config(
    config: &UpstreamConfig,
    network: &Network,
    start: LedgerSeq,
) -> Result<Box<dyn LedgerSource>, Error> {
    match config {
        UpstreamConfig::Node(config) => {
            let source = node::NodeSource::connect(&config.node_address).await?;
            Ok(Box::new(source))
        }
        UpstreamConfig::Emulator(config) => {
            let source = emulator::EmulatorSource::new(config, network.clone(), start);
            Ok(Box::new(source))
        }
    }
}

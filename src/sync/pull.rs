use gasket::framework::*;
use tracing::debug;

use argus_core::config::UpstreamConfig;

use crate::prelude::*;
use crate::upstream::{self, LedgerSource};

pub type DownstreamPort = gasket::messaging::OutputPort<RawLedger>;

#[derive(Stage)]
#[stage(name = "pull", unit = "RawLedger", worker = "Worker")]
pub struct Stage {
    config: UpstreamConfig,
    network: Network,
    intersect: LedgerSeq,

    pub downstream: DownstreamPort,

    #[metric]
    pulled_count: gasket::metrics::Counter,
}

impl Stage {
    pub fn new(config: UpstreamConfig, network: Network, intersect: LedgerSeq) -> Self {
        Self {
            config,
            network,
            intersect,
            downstream: Default::default(),
            pulled_count: Default::default(),
        }
    }
}

pub struct Worker {
    source: Box<dyn LedgerSource>,
}

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(stage: &Stage) -> Result<Self, WorkerError> {
        let source = upstream::from_config(&stage.config, &stage.network, stage.intersect)
            .await
            .or_restart()?;

        Ok(Self { source })
    }

    async fn schedule(&mut self, _stage: &mut Stage) -> Result<WorkSchedule<RawLedger>, WorkerError> {
        let next = self.source.next_ledger().await.or_restart()?;

        Ok(WorkSchedule::Unit(next))
    }

    async fn execute(&mut self, unit: &RawLedger, stage: &mut Stage) -> Result<(), WorkerError> {
        debug!(sequence = unit.sequence, "ledger pulled from upstream");

        stage.downstream.send(unit.clone().into()).await.or_panic()?;
        stage.pulled_count.inc(1);

        Ok(())
    }
}

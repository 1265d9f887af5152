use gasket::framework::*;
use tracing::{debug, info};

use argus_core::IngestWriter as _;

use crate::prelude::*;

pub type UpstreamPort = gasket::messaging::InputPort<RawLedger>;

#[derive(Stage)]
#[stage(name = "apply", unit = "RawLedger", worker = "Worker")]
pub struct Stage {
    store: argus_redb::LedgerStore,
    retention_window: u32,

    pub upstream: UpstreamPort,

    #[metric]
    ingested_count: gasket::metrics::Counter,
}

impl Stage {
    pub fn new(store: argus_redb::LedgerStore, retention_window: u32) -> Self {
        Self {
            store,
            retention_window,
            upstream: Default::default(),
            ingested_count: Default::default(),
        }
    }
}

pub struct Worker;

impl Worker {
    /// Writes one ledger and every derived row in a single transaction.
    /// Nothing becomes visible unless the commit at the end succeeds.
    fn ingest(stage: &Stage, unit: &RawLedger) -> Result<(), WorkerError> {
        // corrupt upstream data is unrecoverable; stop the pipeline
        let lcm = LedgerCloseMeta::decode(&unit.body).or_panic()?;

        let writer = stage.store.start_writer().or_retry()?;

        writer.insert_ledger(unit).or_retry()?;
        writer.insert_transactions(&lcm).or_retry()?;
        writer.insert_events(&lcm).or_retry()?;
        writer.set_latest_ledger(unit.sequence).or_retry()?;

        writer.commit().or_retry()?;

        Ok(())
    }

    fn housekeeping(stage: &Stage, latest: LedgerSeq) -> Result<(), WorkerError> {
        if latest + 1 <= stage.retention_window {
            return Ok(());
        }

        let cutoff = latest + 1 - stage.retention_window;
        debug!(cutoff, "trimming ledgers past retention");

        stage.store.trim_before(cutoff).or_retry()?;

        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl gasket::framework::Worker<Stage> for Worker {
    async fn bootstrap(_stage: &Stage) -> Result<Self, WorkerError> {
        Ok(Self)
    }

    async fn schedule(&mut self, stage: &mut Stage) -> Result<WorkSchedule<RawLedger>, WorkerError> {
        let msg = stage.upstream.recv().await.or_panic()?;

        Ok(WorkSchedule::Unit(msg.payload))
    }

    async fn execute(&mut self, unit: &RawLedger, stage: &mut Stage) -> Result<(), WorkerError> {
        Self::ingest(stage, unit)?;

        info!(sequence = unit.sequence, "ledger ingested");
        stage.ingested_count.inc(1);

        Self::housekeeping(stage, unit.sequence)?;

        Ok(())
    }
}

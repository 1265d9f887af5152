use std::time::Duration;

use argus_core::config::UpstreamConfig;

use crate::prelude::*;

pub mod apply;
pub mod pull;

fn define_gasket_policy(config: &Option<gasket::retries::Policy>) -> gasket::runtime::Policy {
    let default_retries = gasket::retries::Policy {
        max_retries: 20,
        backoff_unit: Duration::from_secs(1),
        backoff_factor: 2,
        max_backoff: Duration::from_secs(60),
        dismissible: false,
    };

    let retries = config.clone().unwrap_or(default_retries);

    gasket::runtime::Policy {
        //be generous with tick timeout to avoid timeout during ledger awaits
        tick_timeout: std::time::Duration::from_secs(600).into(),
        bootstrap_retry: retries.clone(),
        work_retry: retries.clone(),
        teardown_retry: retries.clone(),
    }
}

pub fn pipeline(
    upstream: &UpstreamConfig,
    store: argus_redb::LedgerStore,
    network: Network,
    retention_window: u32,
    retries: &Option<gasket::retries::Policy>,
) -> Result<gasket::daemon::Daemon, Error> {
    // resume immediately after whatever was last committed
    let intersect = store
        .latest_ledger()
        .map_err(StoreError::from)?
        .map(|x| x + 1)
        .unwrap_or(FIRST_LEDGER);

    let mut pull = pull::Stage::new(upstream.clone(), network, intersect);
    let mut apply = apply::Stage::new(store, retention_window);

    let (to_apply, from_pull) = gasket::messaging::tokio::mpsc_channel(50);
    pull.downstream.connect(to_apply);
    apply.upstream.connect(from_pull);

    let policy = define_gasket_policy(retries);

    let pull = gasket::runtime::spawn_stage(pull, policy.clone());
    let apply = gasket::runtime::spawn_stage(apply, policy);

    Ok(gasket::daemon::Daemon::new(vec![pull, apply]))
}

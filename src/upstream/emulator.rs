use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use argus_core::config::EmulatorConfig;

use super::LedgerSource;
use crate::prelude::*;

/// Synthesizes a steady stream of closed ledgers for local runs without a
/// consensus node. Each ledger carries one successful transaction emitting
/// one contract event.
pub struct EmulatorSource {
    network: Network,
    next_sequence: LedgerSeq,
    interval: Duration,
}

impl EmulatorSource {
    pub fn new(config: &EmulatorConfig, network: Network, start: LedgerSeq) -> Self {
        Self {
            network,
            next_sequence: start.max(FIRST_LEDGER),
            interval: Duration::from_millis(config.ledger_production_interval),
        }
    }

    fn synthesize(&self, sequence: LedgerSeq) -> LedgerCloseMeta {
        let close_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        let mut contract_id = [0u8; 32];
        contract_id[..4].copy_from_slice(&(sequence % 16).to_be_bytes());

        let tx = TransactionRecord {
            envelope: TransactionEnvelope::Tx(TransactionV1 {
                source_account: *self.network.id(),
                fee: 100,
                seq_num: sequence as i64,
            }),
            result: TransactionResult {
                fee_charged: 100,
                code: ResultCode::Success,
            },
            meta: TransactionMeta {
                diagnostic_events: vec![DiagnosticEvent {
                    contract_id: Some(contract_id),
                    kind: EventKind::Contract,
                    topics: vec![Val::Symbol("COUNTER".to_string())],
                    data: Val::U64(sequence as u64),
                }],
                return_value: Some(Val::Bool(true)),
            },
        };

        LedgerCloseMeta {
            header: LedgerHeader {
                sequence,
                close_time,
            },
            transactions: vec![tx],
        }
    }
}

#[async_trait::async_trait]
impl LedgerSource for EmulatorSource {
    async fn next_ledger(&mut self) -> Result<RawLedger, Error> {
        tokio::time::sleep(self.interval).await;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        debug!(sequence, "emulator closed a ledger");

        Ok(self.synthesize(sequence).to_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emulated_ledgers_are_sequential_and_decodable() {
        let config = EmulatorConfig {
            ledger_production_interval: 0,
        };

        let mut source = EmulatorSource::new(&config, Network::new("emulator"), 0);

        let first = source.next_ledger().await.unwrap();
        let second = source.next_ledger().await.unwrap();

        assert_eq!(first.sequence, FIRST_LEDGER);
        assert_eq!(second.sequence, FIRST_LEDGER + 1);

        let lcm = LedgerCloseMeta::decode(&first.body).unwrap();
        assert_eq!(lcm.sequence(), first.sequence);
        assert_eq!(lcm.transactions.len(), 1);
        assert!(lcm.transactions[0].result.is_success());
    }
}

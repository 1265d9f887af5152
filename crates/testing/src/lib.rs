//! Synthetic ledger fixtures used across the argus test suites.
//!
//! Close times follow the fixture convention `sequence * 25 + 100` so that
//! assertions on observability fields stay readable.

use argus_core::{
    CancelToken, ContractId, DiagnosticEvent, EventKind, LedgerCloseMeta, LedgerHeader, LedgerSeq,
    Network, RawLedger, ResultCode, TransactionEnvelope, TransactionMeta, TransactionRecord,
    TransactionResult, TransactionV1, Val,
};

pub const TEST_PASSPHRASE: &str = "argus test network; may 2024";

pub fn test_network() -> Network {
    Network::new(TEST_PASSPHRASE)
}

pub fn close_time(sequence: LedgerSeq) -> i64 {
    sequence as i64 * 25 + 100
}

pub fn test_contract_id(tag: u8) -> ContractId {
    [tag; 32]
}

/// A plain envelope whose hash is unique per `seq_hint`.
pub fn make_envelope(seq_hint: i64) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1 {
        source_account: [7; 32],
        fee: 100,
        seq_num: seq_hint,
    })
}

pub fn make_fee_bump_envelope(seq_hint: i64) -> TransactionEnvelope {
    let TransactionEnvelope::Tx(inner) = make_envelope(seq_hint) else {
        unreachable!()
    };

    TransactionEnvelope::FeeBump(argus_core::FeeBumpEnvelope {
        fee_source: [8; 32],
        fee: 200,
        inner,
    })
}

pub fn contract_event(contract_id: ContractId, topic: &str) -> DiagnosticEvent {
    DiagnosticEvent {
        contract_id: Some(contract_id),
        kind: EventKind::Contract,
        topics: vec![Val::Symbol(topic.to_string())],
        data: Val::Symbol(topic.to_string()),
    }
}

pub fn system_event() -> DiagnosticEvent {
    DiagnosticEvent {
        contract_id: None,
        kind: EventKind::System,
        topics: vec![Val::Symbol("core_metrics".to_string())],
        data: Val::U64(1),
    }
}

pub fn make_tx(
    seq_hint: i64,
    successful: bool,
    events: Vec<DiagnosticEvent>,
) -> TransactionRecord {
    let code = if successful {
        ResultCode::Success
    } else {
        ResultCode::BadSequence
    };

    TransactionRecord {
        envelope: make_envelope(seq_hint),
        result: TransactionResult {
            fee_charged: 100,
            code,
        },
        meta: TransactionMeta {
            diagnostic_events: events,
            return_value: None,
        },
    }
}

pub fn make_ledger(sequence: LedgerSeq, transactions: Vec<TransactionRecord>) -> LedgerCloseMeta {
    LedgerCloseMeta {
        header: LedgerHeader {
            sequence,
            close_time: close_time(sequence),
        },
        transactions,
    }
}

/// A ledger holding one transaction with one contract event, the smallest
/// shape that exercises every derived table.
pub fn make_simple_ledger(sequence: LedgerSeq, contract_id: ContractId) -> LedgerCloseMeta {
    make_ledger(
        sequence,
        vec![make_tx(
            sequence as i64,
            true,
            vec![contract_event(contract_id, "COUNTER")],
        )],
    )
}

pub fn make_raw(lcm: &LedgerCloseMeta) -> RawLedger {
    lcm.to_raw()
}

/// Cancellation token that never fires, for driving scans in tests.
#[derive(Clone, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    async fn cancelled(&self) {
        std::future::pending::<()>().await
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Token that reports cancellation from the first poll, for exercising the
/// abort path of scans.
#[derive(Clone, Default)]
pub struct AlwaysCancel;

impl CancelToken for AlwaysCancel {
    async fn cancelled(&self) {}

    fn is_cancelled(&self) -> bool {
        true
    }
}

//! The ledger-close-meta wire model.
//!
//! Upstream emits one of these records for every closed ledger. The binary
//! form is the canonical encoding: stores keep it unchanged and the read
//! path re-encodes sub-records (envelope, result, meta, events) from it.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

use crate::{ContractId, LedgerSeq, Network, RawLedger, TxHash, TxIdx};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed binary payload: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for CodecError {
    fn from(value: bincode::Error) -> Self {
        CodecError::Malformed(value.to_string())
    }
}

macro_rules! canonical_codec {
    ($($type:ty),+) => {
        $(
            impl $type {
                pub fn encode(&self) -> Vec<u8> {
                    bincode::serialize(self).unwrap()
                }

                pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
                    Ok(bincode::deserialize(bytes)?)
                }
            }
        )+
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub sequence: LedgerSeq,
    pub close_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCloseMeta {
    pub header: LedgerHeader,
    pub transactions: Vec<TransactionRecord>,
}

impl LedgerCloseMeta {
    pub fn sequence(&self) -> LedgerSeq {
        self.header.sequence
    }

    pub fn close_time(&self) -> i64 {
        self.header.close_time
    }

    /// Looks up a transaction by its 1-based apply-order position.
    pub fn transaction(&self, application_order: TxIdx) -> Option<&TransactionRecord> {
        let index = (application_order as usize).checked_sub(1)?;
        self.transactions.get(index)
    }

    pub fn to_raw(&self) -> RawLedger {
        RawLedger {
            sequence: self.sequence(),
            body: self.encode(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub envelope: TransactionEnvelope,
    pub result: TransactionResult,
    pub meta: TransactionMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionEnvelope {
    Tx(TransactionV1),
    FeeBump(FeeBumpEnvelope),
}

impl TransactionEnvelope {
    pub fn is_fee_bump(&self) -> bool {
        matches!(self, TransactionEnvelope::FeeBump(_))
    }

    /// Deterministic transaction hash under the given network identity.
    pub fn hash(&self, network: &Network) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(network.id());
        hasher.update(self.encode());
        hasher.finalize().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionV1 {
    pub source_account: [u8; 32],
    pub fee: u32,
    pub seq_num: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBumpEnvelope {
    pub fee_source: [u8; 32],
    pub fee: i64,
    pub inner: TransactionV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    InsufficientFee,
    BadSequence,
    ContractError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub fee_charged: i64,
    pub code: ResultCode,
}

impl TransactionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.code, ResultCode::Success)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    pub diagnostic_events: Vec<DiagnosticEvent>,
    pub return_value: Option<Val>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Contract,
    System,
    Diagnostic,
}

impl EventKind {
    pub fn as_int(&self) -> u8 {
        match self {
            EventKind::Contract => 0,
            EventKind::System => 1,
            EventKind::Diagnostic => 2,
        }
    }
}

impl TryFrom<u8> for EventKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventKind::Contract),
            1 => Ok(EventKind::System),
            2 => Ok(EventKind::Diagnostic),
            unknown => Err(CodecError::Malformed(format!(
                "unknown event kind {unknown}"
            ))),
        }
    }
}

/// Side-channel event emitted by a smart-contract execution, enumerable from
/// the transaction's post-apply meta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub contract_id: Option<ContractId>,
    pub kind: EventKind,
    pub topics: Vec<Val>,
    pub data: Val,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Val {
    Symbol(String),
    Bytes(Vec<u8>),
    U64(u64),
    I64(i64),
    Bool(bool),
}

canonical_codec!(
    LedgerCloseMeta,
    TransactionRecord,
    TransactionEnvelope,
    TransactionResult,
    TransactionMeta,
    DiagnosticEvent,
    Val
);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lcm() -> LedgerCloseMeta {
        LedgerCloseMeta {
            header: LedgerHeader {
                sequence: 101,
                close_time: 2625,
            },
            transactions: vec![TransactionRecord {
                envelope: TransactionEnvelope::Tx(TransactionV1 {
                    source_account: [7; 32],
                    fee: 100,
                    seq_num: 1,
                }),
                result: TransactionResult {
                    fee_charged: 100,
                    code: ResultCode::Success,
                },
                meta: TransactionMeta {
                    diagnostic_events: vec![DiagnosticEvent {
                        contract_id: Some([9; 32]),
                        kind: EventKind::Contract,
                        topics: vec![Val::Symbol("COUNTER".to_string())],
                        data: Val::U64(1),
                    }],
                    return_value: None,
                },
            }],
        }
    }

    #[test]
    fn canonical_encoding_round_trips() {
        let lcm = sample_lcm();
        let decoded = LedgerCloseMeta::decode(&lcm.encode()).unwrap();
        assert_eq!(decoded, lcm);

        assert!(LedgerCloseMeta::decode(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn transaction_lookup_is_one_based() {
        let lcm = sample_lcm();
        assert!(lcm.transaction(0).is_none());
        assert!(lcm.transaction(1).is_some());
        assert!(lcm.transaction(2).is_none());
    }

    #[test]
    fn envelope_hash_depends_on_network() {
        let lcm = sample_lcm();
        let envelope = &lcm.transactions[0].envelope;

        let mainnet = Network::new("main");
        let testnet = Network::new("test");

        assert_eq!(envelope.hash(&mainnet), envelope.hash(&mainnet));
        assert_ne!(envelope.hash(&mainnet), envelope.hash(&testnet));
    }

    #[test]
    fn fee_bump_discriminant() {
        let plain = TransactionEnvelope::Tx(TransactionV1 {
            source_account: [0; 32],
            fee: 1,
            seq_num: 1,
        });
        assert!(!plain.is_fee_bump());

        let TransactionEnvelope::Tx(inner) = plain else {
            unreachable!()
        };

        let bumped = TransactionEnvelope::FeeBump(FeeBumpEnvelope {
            fee_source: [1; 32],
            fee: 200,
            inner,
        });
        assert!(bumped.is_fee_bump());
    }
}

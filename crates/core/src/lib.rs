use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

pub mod config;
mod cursor;
mod ledger;
mod migrate;
mod store;

pub use cursor::*;
pub use ledger::*;
pub use migrate::*;
pub use store::*;

/// Sequence number assigned to a ledger by the upstream consensus node.
pub type LedgerSeq = u32;

/// The 1-based position of a transaction within a ledger, in apply order.
pub type TxIdx = u32;

/// The 0-based position of an event within a transaction's diagnostic list.
pub type EventIdx = u32;

/// Canonical binary encoding of a ledger-close-meta record.
pub type LedgerBlob = Vec<u8>;

pub type TxHash = [u8; 32];
pub type ContractId = [u8; 32];

/// Lowest ledger sequence the service will ever ingest or serve.
pub const FIRST_LEDGER: LedgerSeq = 2;

/// A ledger-close-meta record as received from upstream, paired with its
/// sequence so that stores can key it without decoding the body.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct RawLedger {
    pub sequence: LedgerSeq,
    pub body: LedgerBlob,
}

impl RawLedger {
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl PartialEq for RawLedger {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl PartialOrd for RawLedger {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.sequence.partial_cmp(&other.sequence)
    }
}

/// Process-wide network identity, fixed at startup.
///
/// The id is mixed into every transaction hash so that a transaction signed
/// for one network can never be looked up on another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    id: [u8; 32],
}

impl Network {
    pub fn new(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(passphrase.as_bytes());
        Self {
            id: hasher.finalize().into(),
        }
    }

    pub fn id(&self) -> &[u8; 32] {
        &self.id
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind listener")]
    BindError(std::io::Error),

    #[error("failed to shutdown")]
    ShutdownError(std::io::Error),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[trait_variant::make(Send)]
pub trait CancelToken: Send + Sync + 'static + Clone {
    async fn cancelled(&self);

    fn is_cancelled(&self) -> bool;
}

#[trait_variant::make(Send)]
pub trait Driver<S: LedgerStore, C: CancelToken>: Send + Sync + 'static {
    type Config: Clone;

    async fn run(config: Self::Config, store: S, cancel: C) -> Result<(), ServeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_id_is_deterministic() {
        let a = Network::new("test network");
        let b = Network::new("test network");
        assert_eq!(a, b);

        let c = Network::new("other network");
        assert_ne!(a, c);
    }

    #[test]
    fn raw_ledger_equality_ignores_body() {
        let a = RawLedger {
            sequence: 7,
            body: vec![1, 2, 3],
        };
        let b = RawLedger {
            sequence: 7,
            body: vec![],
        };
        assert_eq!(a, b);
        assert!(
            a < RawLedger {
                sequence: 8,
                body: vec![],
            }
        );
    }
}

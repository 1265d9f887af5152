use thiserror::Error;

use crate::cursor::{Cursor, CursorRange};
use crate::ledger::{DiagnosticEvent, LedgerCloseMeta};
use crate::{CancelToken, ContractId, LedgerBlob, LedgerSeq, RawLedger, TxHash, TxIdx};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("ledger {0} failed to decode")]
    LedgerDecoding(LedgerSeq),

    #[error("ledger {ledger} has no transaction at position {tx}")]
    TxPositionOutOfRange { ledger: LedgerSeq, tx: TxIdx },

    #[error("invalid store version {0}")]
    InvalidStoreVersion(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Summary of one end of the retention window, used to populate the
/// observability fields of query responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerInfo {
    pub sequence: LedgerSeq,
    pub close_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerBounds {
    pub oldest: LedgerInfo,
    pub latest: LedgerInfo,
}

/// A transaction reconstructed from the ledger store, with every payload in
/// its canonical binary encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionView {
    pub ledger: LedgerSeq,
    pub close_time: i64,
    pub application_order: TxIdx,
    pub successful: bool,
    pub fee_bump: bool,
    pub envelope: Vec<u8>,
    pub result: Vec<u8>,
    pub meta: Vec<u8>,
    pub events: Vec<Vec<u8>>,
}

/// Visitor invoked once per matched event, in strictly ascending cursor
/// order. Returning false terminates the scan.
pub type ScanFn<'a> = dyn FnMut(&DiagnosticEvent, Cursor, i64, &TxHash) -> bool + 'a;

/// Write half of an ingest or migration transaction. All rows written
/// through one writer become visible atomically on commit; dropping the
/// writer without committing discards everything.
pub trait IngestWriter: Send + Sync {
    fn insert_ledger(&self, ledger: &RawLedger) -> Result<(), StoreError>;

    fn insert_transactions(&self, lcm: &LedgerCloseMeta) -> Result<(), StoreError>;

    fn insert_events(&self, lcm: &LedgerCloseMeta) -> Result<(), StoreError>;

    fn set_latest_ledger(&self, seq: LedgerSeq) -> Result<(), StoreError>;

    fn set_migration_completed(&self, name: &str) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

pub trait LedgerStore: Clone + Send + Sync + 'static {
    type LedgerIter: Iterator<Item = (LedgerSeq, LedgerBlob)> + DoubleEndedIterator;
    type Writer: IngestWriter;

    fn start_writer(&self) -> Result<Self::Writer, StoreError>;

    fn get_ledger(&self, seq: LedgerSeq) -> Result<Option<LedgerBlob>, StoreError>;

    /// Ordered iterator over the half-open sequence range [from, to).
    fn get_range(
        &self,
        from: Option<LedgerSeq>,
        to: Option<LedgerSeq>,
    ) -> Result<Self::LedgerIter, StoreError>;

    fn bounds(&self) -> Result<Option<LedgerBounds>, StoreError>;

    fn latest_ledger(&self) -> Result<Option<LedgerSeq>, StoreError>;

    fn get_transaction(&self, hash: &TxHash) -> Result<Option<TransactionView>, StoreError>;

    fn get_events<C: CancelToken>(
        &self,
        range: CursorRange,
        contract_ids: &[ContractId],
        cancel: &C,
        scan: &mut ScanFn,
    ) -> Result<(), StoreError>;

    /// Deletes every row, in every table, referencing a ledger sequence
    /// below the cutoff.
    fn trim_before(&self, cutoff: LedgerSeq) -> Result<(), StoreError>;

    fn migration_completed(&self, name: &str) -> Result<bool, StoreError>;
}

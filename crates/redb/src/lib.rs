use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use ::redb::{Database, Range, ReadableTable as _, WriteTransaction};
use tracing::warn;

use argus_core::{
    CancelToken, ContractId, Cursor, CursorRange, IngestWriter, LedgerBlob, LedgerBounds,
    LedgerCloseMeta, LedgerInfo, LedgerSeq, Network, RawLedger, ScanFn, StoreError, TxHash,
    TransactionView,
};

mod indexes;
mod tables;

#[cfg(test)]
mod tests;

#[derive(Debug)]
pub struct RedbStoreError(StoreError);

impl From<StoreError> for RedbStoreError {
    fn from(value: StoreError) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RedbStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<RedbStoreError> for StoreError {
    fn from(value: RedbStoreError) -> Self {
        value.0
    }
}

impl From<::redb::DatabaseError> for RedbStoreError {
    fn from(value: ::redb::DatabaseError) -> Self {
        Self(StoreError::Internal(Box::new(::redb::Error::from(value))))
    }
}

impl From<::redb::TableError> for RedbStoreError {
    fn from(value: ::redb::TableError) -> Self {
        Self(StoreError::Internal(Box::new(::redb::Error::from(value))))
    }
}

impl From<::redb::CommitError> for RedbStoreError {
    fn from(value: ::redb::CommitError) -> Self {
        Self(StoreError::Internal(Box::new(::redb::Error::from(value))))
    }
}

impl From<::redb::StorageError> for RedbStoreError {
    fn from(value: ::redb::StorageError) -> Self {
        Self(StoreError::Internal(Box::new(::redb::Error::from(value))))
    }
}

impl From<::redb::TransactionError> for RedbStoreError {
    fn from(value: ::redb::TransactionError) -> Self {
        Self(StoreError::Internal(Box::new(::redb::Error::from(value))))
    }
}

const DEFAULT_CACHE_SIZE_MB: usize = 500;

/// Row counts per table, for the data summary admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub ledgers: u64,
    pub transactions: u64,
    pub events: u64,
}

#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<Database>,
    network: Network,
}

impl LedgerStore {
    pub fn open(
        path: impl AsRef<Path>,
        cache_size: Option<usize>,
        network: Network,
    ) -> Result<Self, RedbStoreError> {
        let db = Database::builder()
            .set_repair_callback(|x| {
                warn!(progress = x.progress() * 100f64, "ledger db is repairing")
            })
            .set_cache_size(1024 * 1024 * cache_size.unwrap_or(DEFAULT_CACHE_SIZE_MB))
            .create(path)?;

        Self::initialize(db, network)
    }

    pub fn in_memory(network: Network) -> Result<Self, StoreError> {
        let db = ::redb::Database::builder()
            .create_with_backend(::redb::backends::InMemoryBackend::new())
            .map_err(RedbStoreError::from)?;

        Ok(Self::initialize(db, network)?)
    }

    pub fn initialize(db: Database, network: Network) -> Result<Self, RedbStoreError> {
        let wx = db.begin_write()?;

        tables::LedgersTable::initialize(&wx)?;
        tables::TransactionsTable::initialize(&wx)?;
        tables::MetaTable::initialize(&wx)?;
        indexes::Indexes::initialize(&wx)?;

        {
            let mut meta = wx.open_table(tables::MetaTable::DEF)?;
            let current = meta
                .get(tables::MetaTable::SCHEMA_VERSION_KEY)?
                .map(|x| String::from_utf8_lossy(x.value()).into_owned());

            match current {
                None => {
                    meta.insert(
                        tables::MetaTable::SCHEMA_VERSION_KEY,
                        tables::MetaTable::SCHEMA_VERSION.as_bytes(),
                    )?;
                }
                Some(version) if version != tables::MetaTable::SCHEMA_VERSION => {
                    return Err(StoreError::InvalidStoreVersion(version).into());
                }
                Some(_) => (),
            }
        }

        wx.commit()?;

        Ok(Self {
            db: Arc::new(db),
            network,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn start_writer(&self) -> Result<StoreWriter, RedbStoreError> {
        let mut wx = self.db.begin_write()?;
        wx.set_quick_repair(true);

        Ok(StoreWriter {
            wx,
            network: self.network.clone(),
        })
    }

    pub fn get_ledger(&self, seq: LedgerSeq) -> Result<Option<LedgerBlob>, RedbStoreError> {
        let rx = self.db.begin_read()?;
        tables::LedgersTable::get_by_seq(&rx, seq)
    }

    pub fn get_range(
        &self,
        from: Option<LedgerSeq>,
        to: Option<LedgerSeq>,
    ) -> Result<LedgerRangeIter, RedbStoreError> {
        let rx = self.db.begin_read()?;
        let range = tables::LedgersTable::get_range(&rx, from, to)?;
        Ok(LedgerRangeIter(range))
    }

    pub fn bounds(&self) -> Result<Option<LedgerBounds>, RedbStoreError> {
        let rx = self.db.begin_read()?;

        let Some((oldest_seq, oldest_blob)) = tables::LedgersTable::first(&rx)? else {
            return Ok(None);
        };

        let Some((latest_seq, latest_blob)) = tables::LedgersTable::last(&rx)? else {
            return Ok(None);
        };

        Ok(Some(LedgerBounds {
            oldest: decode_info(oldest_seq, &oldest_blob)?,
            latest: decode_info(latest_seq, &latest_blob)?,
        }))
    }

    pub fn latest_ledger(&self) -> Result<Option<LedgerSeq>, RedbStoreError> {
        let rx = self.db.begin_read()?;

        let Some(value) = tables::MetaTable::get(&rx, tables::MetaTable::LATEST_LEDGER_KEY)? else {
            return Ok(None);
        };

        let seq = value
            .parse()
            .map_err(|x| StoreError::Internal(Box::new(x)))?;

        Ok(Some(seq))
    }

    pub fn get_transaction(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionView>, RedbStoreError> {
        let rx = self.db.begin_read()?;

        let Some(row) = tables::TransactionsTable::get_by_hash(&rx, hash)? else {
            return Ok(None);
        };

        // an index row outliving its blob means the ledger was trimmed
        // between lookup and fetch; report it as absent
        let Some(blob) = tables::LedgersTable::get_by_seq(&rx, row.ledger)? else {
            return Ok(None);
        };

        let lcm = LedgerCloseMeta::decode(&blob)
            .map_err(|_| StoreError::LedgerDecoding(row.ledger))?;

        let record = lcm
            .transaction(row.tx)
            .ok_or(StoreError::TxPositionOutOfRange {
                ledger: row.ledger,
                tx: row.tx,
            })?;

        Ok(Some(TransactionView {
            ledger: row.ledger,
            close_time: lcm.close_time(),
            application_order: row.tx,
            successful: record.result.is_success(),
            fee_bump: record.envelope.is_fee_bump(),
            envelope: record.envelope.encode(),
            result: record.result.encode(),
            meta: record.meta.encode(),
            events: record
                .meta
                .diagnostic_events
                .iter()
                .map(|x| x.encode())
                .collect(),
        }))
    }

    pub fn get_events<C: CancelToken>(
        &self,
        range: CursorRange,
        contract_ids: &[ContractId],
        cancel: &C,
        scan: &mut ScanFn,
    ) -> Result<(), RedbStoreError> {
        let rx = self.db.begin_read()?;

        // resolve the index into the distinct (ledger, tx) positions that
        // may hold matching events, in ascending order
        let mut positions: BTreeSet<(LedgerSeq, u32)> = BTreeSet::new();

        if contract_ids.is_empty() {
            for entry in indexes::EventsTable::get_range(&rx, &range)? {
                let (key, _) = entry?;
                let cursor = Cursor::unpack(key.value());
                positions.insert((cursor.ledger, cursor.tx));
            }
        } else {
            for contract_id in contract_ids {
                for position in indexes::ByContractIndexTable::iter_by_contract(&rx, contract_id)? {
                    let (ledger, tx) = position?;

                    let lowest = Cursor {
                        ledger,
                        tx,
                        event: 0,
                    };
                    let highest = Cursor {
                        ledger,
                        tx,
                        event: u32::MAX,
                    };

                    if highest >= range.start && lowest < range.end {
                        positions.insert((ledger, tx));
                    }
                }
            }
        }

        for (ledger, tx) in positions {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled.into());
            }

            // trimmed under us; treat as retention-expired
            let Some(blob) = tables::LedgersTable::get_by_seq(&rx, ledger)? else {
                continue;
            };

            let lcm =
                LedgerCloseMeta::decode(&blob).map_err(|_| StoreError::LedgerDecoding(ledger))?;

            let record = lcm
                .transaction(tx)
                .ok_or(StoreError::TxPositionOutOfRange { ledger, tx })?;

            let tx_hash = record.envelope.hash(&self.network);
            let close_time = lcm.close_time();

            for (event_index, event) in record.meta.diagnostic_events.iter().enumerate() {
                let cursor = Cursor {
                    ledger,
                    tx,
                    event: event_index as u32,
                };

                if !range.contains(cursor) {
                    continue;
                }

                if !contract_ids.is_empty() {
                    let matched = event
                        .contract_id
                        .map(|x| contract_ids.contains(&x))
                        .unwrap_or(false);

                    if !matched {
                        continue;
                    }
                }

                if !scan(event, cursor, close_time, &tx_hash) {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    pub fn trim_before(&self, cutoff: LedgerSeq) -> Result<(), RedbStoreError> {
        let mut wx = self.db.begin_write()?;
        wx.set_quick_repair(true);

        tables::LedgersTable::remove_before(&wx, cutoff)?;
        tables::TransactionsTable::remove_before(&wx, cutoff)?;
        indexes::Indexes::remove_before(&wx, cutoff)?;

        wx.commit()?;

        Ok(())
    }

    pub fn migration_completed(&self, name: &str) -> Result<bool, RedbStoreError> {
        let rx = self.db.begin_read()?;
        let marker = tables::MetaTable::get(&rx, &tables::MetaTable::migration_key(name))?;
        Ok(marker.is_some())
    }

    /// Admin operation: drops the event index and forgets the event-index
    /// migration marker so that the next migration run rebuilds both from
    /// the ledger table.
    pub fn clear_event_index(&self) -> Result<(), RedbStoreError> {
        let mut wx = self.db.begin_write()?;
        wx.set_quick_repair(true);

        indexes::Indexes::clear(&wx)?;
        tables::MetaTable::remove(
            &wx,
            &tables::MetaTable::migration_key(argus_core::EVENT_INDEX_MIGRATION),
        )?;

        wx.commit()?;

        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats, RedbStoreError> {
        let rx = self.db.begin_read()?;

        Ok(StoreStats {
            ledgers: tables::LedgersTable::len(&rx)?,
            transactions: tables::TransactionsTable::len(&rx)?,
            events: indexes::EventsTable::len(&rx)?,
        })
    }
}

fn decode_info(seq: LedgerSeq, blob: &[u8]) -> Result<LedgerInfo, RedbStoreError> {
    let lcm = LedgerCloseMeta::decode(blob).map_err(|_| StoreError::LedgerDecoding(seq))?;

    Ok(LedgerInfo {
        sequence: seq,
        close_time: lcm.close_time(),
    })
}

pub struct StoreWriter {
    wx: WriteTransaction,
    network: Network,
}

impl IngestWriter for StoreWriter {
    fn insert_ledger(&self, ledger: &RawLedger) -> Result<(), StoreError> {
        tables::LedgersTable::apply(&self.wx, ledger)?;

        Ok(())
    }

    fn insert_transactions(&self, lcm: &LedgerCloseMeta) -> Result<(), StoreError> {
        tables::TransactionsTable::apply(&self.wx, &self.network, lcm)?;

        Ok(())
    }

    fn insert_events(&self, lcm: &LedgerCloseMeta) -> Result<(), StoreError> {
        indexes::Indexes::apply(&self.wx, lcm)?;

        Ok(())
    }

    fn set_latest_ledger(&self, seq: LedgerSeq) -> Result<(), StoreError> {
        tables::MetaTable::put(
            &self.wx,
            tables::MetaTable::LATEST_LEDGER_KEY,
            &seq.to_string(),
        )?;

        Ok(())
    }

    fn set_migration_completed(&self, name: &str) -> Result<(), StoreError> {
        tables::MetaTable::put(&self.wx, &tables::MetaTable::migration_key(name), "completed")?;

        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.wx.commit().map_err(RedbStoreError::from)?;

        Ok(())
    }
}

impl argus_core::LedgerStore for LedgerStore {
    type LedgerIter = LedgerRangeIter;
    type Writer = StoreWriter;

    fn start_writer(&self) -> Result<Self::Writer, StoreError> {
        Ok(Self::start_writer(self)?)
    }

    fn get_ledger(&self, seq: LedgerSeq) -> Result<Option<LedgerBlob>, StoreError> {
        Ok(Self::get_ledger(self, seq)?)
    }

    fn get_range(
        &self,
        from: Option<LedgerSeq>,
        to: Option<LedgerSeq>,
    ) -> Result<Self::LedgerIter, StoreError> {
        Ok(Self::get_range(self, from, to)?)
    }

    fn bounds(&self) -> Result<Option<LedgerBounds>, StoreError> {
        Ok(Self::bounds(self)?)
    }

    fn latest_ledger(&self) -> Result<Option<LedgerSeq>, StoreError> {
        Ok(Self::latest_ledger(self)?)
    }

    fn get_transaction(&self, hash: &TxHash) -> Result<Option<TransactionView>, StoreError> {
        Ok(Self::get_transaction(self, hash)?)
    }

    fn get_events<C: CancelToken>(
        &self,
        range: CursorRange,
        contract_ids: &[ContractId],
        cancel: &C,
        scan: &mut ScanFn,
    ) -> Result<(), StoreError> {
        Ok(Self::get_events(self, range, contract_ids, cancel, scan)?)
    }

    fn trim_before(&self, cutoff: LedgerSeq) -> Result<(), StoreError> {
        Ok(Self::trim_before(self, cutoff)?)
    }

    fn migration_completed(&self, name: &str) -> Result<bool, StoreError> {
        Ok(Self::migration_completed(self, name)?)
    }
}

pub struct LedgerRangeIter(Range<'static, LedgerSeq, LedgerBlob>);

impl Iterator for LedgerRangeIter {
    type Item = (LedgerSeq, LedgerBlob);

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|x| x.unwrap())
            .map(|(k, v)| (k.value(), v.value()))
    }
}

impl DoubleEndedIterator for LedgerRangeIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|x| x.unwrap())
            .map(|(k, v)| (k.value(), v.value()))
    }
}

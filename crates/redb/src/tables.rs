use ::redb::{ReadTransaction, ReadableTable as _, ReadableTableMetadata as _};
use ::redb::{Range, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::trace;

use argus_core::{LedgerBlob, LedgerSeq, Network, RawLedger, TxHash};

type Error = super::RedbStoreError;

/// Authoritative table: sequence -> canonical ledger-close-meta blob. Every
/// other table in this store is derived from it.
pub struct LedgersTable;

impl LedgersTable {
    pub const DEF: TableDefinition<'static, LedgerSeq, LedgerBlob> =
        TableDefinition::new("ledgers");

    pub fn initialize(wx: &WriteTransaction) -> Result<(), Error> {
        wx.open_table(Self::DEF)?;

        Ok(())
    }

    pub fn get_by_seq(rx: &ReadTransaction, seq: LedgerSeq) -> Result<Option<LedgerBlob>, Error> {
        let table = rx.open_table(Self::DEF)?;
        match table.get(seq)? {
            Some(value) => Ok(Some(value.value().clone())),
            None => Ok(None),
        }
    }

    pub fn apply(wx: &WriteTransaction, ledger: &RawLedger) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        table.insert(ledger.sequence, ledger.body.clone())?;

        Ok(())
    }

    pub fn first(rx: &ReadTransaction) -> Result<Option<(LedgerSeq, LedgerBlob)>, Error> {
        let table = rx.open_table(Self::DEF)?;
        let result = table
            .first()?
            .map(|(seq, raw)| (seq.value(), raw.value().clone()));
        Ok(result)
    }

    pub fn last(rx: &ReadTransaction) -> Result<Option<(LedgerSeq, LedgerBlob)>, Error> {
        let table = rx.open_table(Self::DEF)?;
        let result = table
            .last()?
            .map(|(seq, raw)| (seq.value(), raw.value().clone()));
        Ok(result)
    }

    pub fn len(rx: &ReadTransaction) -> Result<u64, Error> {
        let table = rx.open_table(Self::DEF)?;
        Ok(table.len()?)
    }

    pub fn remove_before(wx: &WriteTransaction, seq: LedgerSeq) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        let mut to_remove = table.extract_from_if(..seq, |_, _| true)?;

        while let Some(Ok((seq, _))) = to_remove.next() {
            trace!(sequence = seq.value(), "removing ledger entry");
        }

        Ok(())
    }

    pub fn get_range(
        rx: &ReadTransaction,
        from: Option<LedgerSeq>,
        to: Option<LedgerSeq>,
    ) -> Result<Range<'static, LedgerSeq, LedgerBlob>, Error> {
        let table = rx.open_table(Self::DEF)?;
        match (from, to) {
            (Some(from), Some(to)) => Ok(table.range(from..to)?),
            (Some(from), None) => Ok(table.range(from..)?),
            (None, Some(to)) => Ok(table.range(..to)?),
            (None, None) => Ok(table.range(0..)?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRow {
    pub ledger: LedgerSeq,
    pub tx: u32,
}

impl ::redb::Value for TxRow {
    type SelfType<'a> = Self;
    type AsBytes<'a>
        = Vec<u8>
    where
        Self: 'a;

    fn fixed_width() -> Option<usize> {
        None
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self
    where
        Self: 'a,
    {
        bincode::deserialize(data).unwrap()
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'a,
        Self: 'b,
    {
        bincode::serialize(value).unwrap()
    }

    fn type_name() -> ::redb::TypeName {
        ::redb::TypeName::new("argus_txrow")
    }
}

/// Transaction index: hash -> (ledger sequence, apply-order position).
/// Failed transactions are indexed too, so that lookups can report them.
pub struct TransactionsTable;

impl TransactionsTable {
    pub const DEF: TableDefinition<'static, TxHash, TxRow> = TableDefinition::new("transactions");

    pub fn initialize(wx: &WriteTransaction) -> Result<(), Error> {
        wx.open_table(Self::DEF)?;

        Ok(())
    }

    pub fn get_by_hash(rx: &ReadTransaction, hash: &TxHash) -> Result<Option<TxRow>, Error> {
        let table = rx.open_table(Self::DEF)?;
        match table.get(hash)? {
            Some(value) => Ok(Some(value.value())),
            None => Ok(None),
        }
    }

    pub fn apply(
        wx: &WriteTransaction,
        network: &Network,
        lcm: &argus_core::LedgerCloseMeta,
    ) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        let ledger = lcm.sequence();

        for (index, record) in lcm.transactions.iter().enumerate() {
            let hash = record.envelope.hash(network);
            let row = TxRow {
                ledger,
                tx: index as u32 + 1,
            };
            table.insert(hash, row)?;
        }

        Ok(())
    }

    pub fn len(rx: &ReadTransaction) -> Result<u64, Error> {
        let table = rx.open_table(Self::DEF)?;
        Ok(table.len()?)
    }

    pub fn remove_before(wx: &WriteTransaction, seq: LedgerSeq) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        let mut to_remove = table.extract_from_if([0u8; 32].., |_, row| row.ledger < seq)?;

        while let Some(Ok((_, row))) = to_remove.next() {
            trace!(sequence = row.value().ledger, "removing transaction entry");
        }

        Ok(())
    }
}

/// Single-row key/value table: schema version, latest ingested ledger and
/// migration completion markers.
pub struct MetaTable;

impl MetaTable {
    pub const DEF: TableDefinition<'static, &'static str, &'static [u8]> =
        TableDefinition::new("meta");

    pub const SCHEMA_VERSION_KEY: &'static str = "schema_version";
    pub const LATEST_LEDGER_KEY: &'static str = "latest_ledger";

    pub const SCHEMA_VERSION: &'static str = "1";

    pub fn initialize(wx: &WriteTransaction) -> Result<(), Error> {
        wx.open_table(Self::DEF)?;

        Ok(())
    }

    pub fn migration_key(name: &str) -> String {
        format!("migration:{name}")
    }

    pub fn get(rx: &ReadTransaction, key: &str) -> Result<Option<String>, Error> {
        let table = rx.open_table(Self::DEF)?;
        match table.get(key)? {
            Some(value) => Ok(Some(String::from_utf8_lossy(value.value()).into_owned())),
            None => Ok(None),
        }
    }

    pub fn put(wx: &WriteTransaction, key: &str, value: &str) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        table.insert(key, value.as_bytes())?;

        Ok(())
    }

    pub fn remove(wx: &WriteTransaction, key: &str) -> Result<(), Error> {
        let mut table = wx.open_table(Self::DEF)?;
        table.remove(key)?;

        Ok(())
    }
}

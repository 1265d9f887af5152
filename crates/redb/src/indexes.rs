use std::hash::{DefaultHasher, Hash as _, Hasher as _};

use ::redb::{
    MultimapTableDefinition, ReadTransaction, ReadableMultimapTable as _, ReadableTable as _,
    ReadableTableMetadata as _,
};
use ::redb::{Range, TableDefinition, WriteTransaction};
use serde::{Deserialize, Serialize};

use argus_core::{ContractId, Cursor, CursorRange, LedgerCloseMeta, LedgerSeq, TxIdx};

type Error = super::RedbStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
    pub contract_id: Option<ContractId>,
    pub kind: u8,
}

impl ::redb::Value for EventRow {
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
        ::redb::TypeName::new("argus_eventrow")
    }
}

/// Event index keyed by the packed (ledger, tx, event) cursor. One row per
/// materially scannable event: failed transactions and transactions without
/// diagnostic events contribute nothing.
pub struct EventsTable;

impl EventsTable {
    pub const DEF: TableDefinition<'static, u128, EventRow> = TableDefinition::new("events");

    pub fn get_range(
        rx: &ReadTransaction,
        range: &CursorRange,
    ) -> Result<Range<'static, u128, EventRow>, Error> {
        let table = rx.open_table(Self::DEF)?;
        Ok(table.range(range.start.pack()..range.end.pack())?)
    }

    pub fn len(rx: &ReadTransaction) -> Result<u64, Error> {
        let table = rx.open_table(Self::DEF)?;
        Ok(table.len()?)
    }
}

/// Approximate secondary index: hashed contract id -> packed (ledger, tx)
/// position. False positives from hash collisions are filtered out when the
/// scan decodes the event bodies.
pub struct ByContractIndexTable;

impl ByContractIndexTable {
    pub const DEF: MultimapTableDefinition<'static, u64, u64> =
        MultimapTableDefinition::new("bycontract");

    pub fn compute_key(contract_id: &ContractId) -> u64 {
        let mut hasher = DefaultHasher::new();
        contract_id.hash(&mut hasher);
        hasher.finish()
    }

    pub fn pack_position(ledger: LedgerSeq, tx: TxIdx) -> u64 {
        ((ledger as u64) << 32) | tx as u64
    }

    pub fn unpack_position(raw: u64) -> (LedgerSeq, TxIdx) {
        ((raw >> 32) as u32, raw as u32)
    }

    pub fn iter_by_contract(
        rx: &ReadTransaction,
        contract_id: &ContractId,
    ) -> Result<PositionIterator, Error> {
        let table = rx.open_multimap_table(Self::DEF)?;
        let key = Self::compute_key(contract_id);
        let range = table.get(key)?;
        Ok(PositionIterator { range })
    }
}

pub struct PositionIterator {
    range: ::redb::MultimapValue<'static, u64>,
}

impl Iterator for PositionIterator {
    type Item = Result<(LedgerSeq, TxIdx), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.range.next()?;
        let res = next
            .map(|x| ByContractIndexTable::unpack_position(x.value()))
            .map_err(Error::from);
        Some(res)
    }
}

/// Facade over the two event tables so that writers keep them in lockstep.
pub struct Indexes;

impl Indexes {
    pub fn initialize(wx: &WriteTransaction) -> Result<(), Error> {
        wx.open_table(EventsTable::DEF)?;
        wx.open_multimap_table(ByContractIndexTable::DEF)?;

        Ok(())
    }

    pub fn apply(wx: &WriteTransaction, lcm: &LedgerCloseMeta) -> Result<(), Error> {
        let mut events = wx.open_table(EventsTable::DEF)?;
        let mut by_contract = wx.open_multimap_table(ByContractIndexTable::DEF)?;

        let ledger = lcm.sequence();

        for (index, record) in lcm.transactions.iter().enumerate() {
            if !record.result.is_success() {
                continue;
            }

            if record.meta.diagnostic_events.is_empty() {
                continue;
            }

            let tx = index as u32 + 1;

            for (event_index, event) in record.meta.diagnostic_events.iter().enumerate() {
                let cursor = Cursor {
                    ledger,
                    tx,
                    event: event_index as u32,
                };

                let row = EventRow {
                    contract_id: event.contract_id,
                    kind: event.kind.as_int(),
                };

                events.insert(cursor.pack(), row)?;

                if let Some(contract_id) = &event.contract_id {
                    by_contract.insert(
                        ByContractIndexTable::compute_key(contract_id),
                        ByContractIndexTable::pack_position(ledger, tx),
                    )?;
                }
            }
        }

        Ok(())
    }

    pub fn remove_before(wx: &WriteTransaction, seq: LedgerSeq) -> Result<(), Error> {
        let cutoff = Cursor {
            ledger: seq,
            tx: 0,
            event: 0,
        };

        let mut events = wx.open_table(EventsTable::DEF)?;
        let mut to_remove = events.extract_from_if(..cutoff.pack(), |_, _| true)?;
        while to_remove.next().is_some() {}
        drop(to_remove);
        drop(events);

        let mut by_contract = wx.open_multimap_table(ByContractIndexTable::DEF)?;

        let mut stale = vec![];
        for entry in by_contract.iter()? {
            let (key, positions) = entry?;
            for position in positions {
                let position = position?.value();
                let (ledger, _) = ByContractIndexTable::unpack_position(position);
                if ledger < seq {
                    stale.push((key.value(), position));
                }
            }
        }

        for (key, position) in stale {
            by_contract.remove(key, position)?;
        }

        Ok(())
    }

    /// Drops both event tables. Used by the rebuild admin operation before
    /// replaying the event-index migration.
    pub fn clear(wx: &WriteTransaction) -> Result<(), Error> {
        wx.delete_table(EventsTable::DEF)?;
        wx.delete_multimap_table(ByContractIndexTable::DEF)?;

        wx.open_table(EventsTable::DEF)?;
        wx.open_multimap_table(ByContractIndexTable::DEF)?;

        Ok(())
    }
}

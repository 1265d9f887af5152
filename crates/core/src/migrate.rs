//! One-shot migrations that (re)populate derived tables from the
//! authoritative ledger store.

use std::fmt::Display;

use tracing::info;

use crate::ledger::LedgerCloseMeta;
use crate::store::{IngestWriter as _, LedgerStore, StoreError};
use crate::{LedgerSeq, FIRST_LEDGER};

pub const EVENT_INDEX_MIGRATION: &str = "event_index";
pub const TRANSACTION_INDEX_MIGRATION: &str = "transaction_index";

/// Inclusive range of ledger sequences a migration must process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSeqRange {
    pub first: LedgerSeq,
    pub last: LedgerSeq,
}

impl LedgerSeqRange {
    pub fn intersect(&self, other: &LedgerSeqRange) -> Option<LedgerSeqRange> {
        let first = self.first.max(other.first);
        let last = self.last.min(other.last);

        (first <= last).then_some(LedgerSeqRange { first, last })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

pub trait Migration<S: LedgerStore> {
    fn name(&self) -> &'static str;

    /// The ledger range this migration must replay, given the latest ledger
    /// currently in the store.
    fn applicable_range(&self, latest: LedgerSeq) -> LedgerSeqRange;

    fn apply(&mut self, writer: &S::Writer, lcm: &LedgerCloseMeta) -> Result<(), StoreError>;
}

/// Rebuilds the event index by replaying `insert_events` over every ledger
/// still within retention.
pub struct EventIndexMigration {
    pub retention_window: u32,
}

impl<S: LedgerStore> Migration<S> for EventIndexMigration {
    fn name(&self) -> &'static str {
        EVENT_INDEX_MIGRATION
    }

    fn applicable_range(&self, latest: LedgerSeq) -> LedgerSeqRange {
        LedgerSeqRange {
            first: latest.saturating_sub(self.retention_window).max(FIRST_LEDGER),
            last: latest,
        }
    }

    fn apply(&mut self, writer: &S::Writer, lcm: &LedgerCloseMeta) -> Result<(), StoreError> {
        writer.insert_events(lcm)
    }
}

/// Same shape as the event migration, over the transaction index.
pub struct TransactionIndexMigration {
    pub retention_window: u32,
}

impl<S: LedgerStore> Migration<S> for TransactionIndexMigration {
    fn name(&self) -> &'static str {
        TRANSACTION_INDEX_MIGRATION
    }

    fn applicable_range(&self, latest: LedgerSeq) -> LedgerSeqRange {
        LedgerSeqRange {
            first: latest.saturating_sub(self.retention_window).max(FIRST_LEDGER),
            last: latest,
        }
    }

    fn apply(&mut self, writer: &S::Writer, lcm: &LedgerCloseMeta) -> Result<(), StoreError> {
        writer.insert_transactions(lcm)
    }
}

/// Runs every not-yet-completed migration in order. A failure aborts the
/// whole run; completed names are skipped on restart.
pub fn run_pending<S: LedgerStore>(
    store: &S,
    migrations: &mut [Box<dyn Migration<S>>],
) -> Result<(), StoreError> {
    let bounds = store.bounds()?;

    for migration in migrations {
        let name = migration.name();

        if store.migration_completed(name)? {
            info!(name, status = %MigrationStatus::Completed, "skipping migration");
            continue;
        }

        info!(name, status = %MigrationStatus::Running, "applying migration");

        match run_one(store, migration.as_mut(), bounds.map(|b| b.into_seq_range())) {
            Ok(replayed) => {
                info!(name, replayed, status = %MigrationStatus::Completed, "migration done");
            }
            Err(err) => {
                info!(name, status = %MigrationStatus::Failed, "migration aborted");
                return Err(err);
            }
        }
    }

    Ok(())
}

impl crate::store::LedgerBounds {
    fn into_seq_range(self) -> LedgerSeqRange {
        LedgerSeqRange {
            first: self.oldest.sequence,
            last: self.latest.sequence,
        }
    }
}

fn run_one<S: LedgerStore>(
    store: &S,
    migration: &mut dyn Migration<S>,
    stored: Option<LedgerSeqRange>,
) -> Result<u64, StoreError> {
    let writer = store.start_writer()?;
    let mut replayed = 0;

    let range = stored.and_then(|stored| {
        migration
            .applicable_range(stored.last)
            .intersect(&stored)
    });

    if let Some(range) = range {
        for (seq, blob) in store.get_range(Some(range.first), range.last.checked_add(1))? {
            if seq > range.last {
                break;
            }

            let lcm =
                LedgerCloseMeta::decode(&blob).map_err(|_| StoreError::LedgerDecoding(seq))?;

            migration.apply(&writer, &lcm)?;
            replayed += 1;
        }
    }

    writer.set_migration_completed(migration.name())?;
    writer.commit()?;

    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_intersection() {
        let a = LedgerSeqRange { first: 10, last: 20 };
        let b = LedgerSeqRange { first: 15, last: 30 };
        assert_eq!(
            a.intersect(&b),
            Some(LedgerSeqRange { first: 15, last: 20 })
        );

        let disjoint = LedgerSeqRange { first: 21, last: 30 };
        assert_eq!(a.intersect(&disjoint), None);

        let inner = LedgerSeqRange { first: 12, last: 13 };
        assert_eq!(a.intersect(&inner), Some(inner));
    }
}

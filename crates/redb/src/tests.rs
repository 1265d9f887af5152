use argus_core::{
    ContractId, Cursor, CursorRange, EventIndexMigration, IngestWriter as _, LedgerCloseMeta,
    Migration, StoreError, TransactionIndexMigration, TxHash,
};
use argus_testing::{
    close_time, contract_event, make_ledger, make_simple_ledger, make_tx, system_event,
    test_contract_id, test_network, AlwaysCancel, NeverCancel,
};

use super::LedgerStore;

fn empty_store() -> LedgerStore {
    LedgerStore::in_memory(test_network()).unwrap()
}

fn ingest(store: &LedgerStore, lcm: &LedgerCloseMeta) {
    let writer = store.start_writer().unwrap();
    writer.insert_ledger(&lcm.to_raw()).unwrap();
    writer.insert_transactions(lcm).unwrap();
    writer.insert_events(lcm).unwrap();
    writer.set_latest_ledger(lcm.sequence()).unwrap();
    writer.commit().unwrap();
}

#[derive(Debug, Clone, PartialEq)]
struct SeenEvent {
    cursor: Cursor,
    contract_id: Option<ContractId>,
    close_time: i64,
    tx_hash: TxHash,
}

fn collect_events(
    store: &LedgerStore,
    range: CursorRange,
    contract_ids: &[ContractId],
) -> Vec<SeenEvent> {
    let mut seen = vec![];

    let mut visitor = |event: &argus_core::DiagnosticEvent,
                       cursor: Cursor,
                       close_time: i64,
                       tx_hash: &TxHash| {
        seen.push(SeenEvent {
            cursor,
            contract_id: event.contract_id,
            close_time,
            tx_hash: *tx_hash,
        });
        true
    };

    store
        .get_events(range, contract_ids, &NeverCancel, &mut visitor)
        .unwrap();

    seen
}

fn full_range() -> CursorRange {
    CursorRange {
        start: Cursor::MIN,
        end: Cursor::MAX,
    }
}

#[test]
fn bounds_track_oldest_and_latest() {
    let store = empty_store();
    assert_eq!(store.bounds().unwrap(), None);

    for seq in [101, 102, 103] {
        ingest(&store, &make_simple_ledger(seq, test_contract_id(1)));
    }

    let bounds = store.bounds().unwrap().unwrap();
    assert_eq!(bounds.oldest.sequence, 101);
    assert_eq!(bounds.oldest.close_time, close_time(101));
    assert_eq!(bounds.latest.sequence, 103);
    assert_eq!(bounds.latest.close_time, close_time(103));

    assert_eq!(store.latest_ledger().unwrap(), Some(103));
}

#[test]
fn upsert_is_idempotent_per_sequence() {
    let store = empty_store();

    ingest(&store, &make_simple_ledger(101, test_contract_id(1)));
    let first = store.get_ledger(101).unwrap().unwrap();

    let replacement = make_ledger(101, vec![]);
    ingest(&store, &replacement);
    let second = store.get_ledger(101).unwrap().unwrap();

    assert_ne!(first, second);
    assert_eq!(second, replacement.encode());
    assert_eq!(store.stats().unwrap().ledgers, 1);
}

#[test]
fn get_range_is_half_open_and_ordered() {
    let store = empty_store();

    for seq in 101..=105 {
        ingest(&store, &make_simple_ledger(seq, test_contract_id(1)));
    }

    let collected: Vec<_> = store
        .get_range(Some(102), Some(104))
        .unwrap()
        .map(|(seq, _)| seq)
        .collect();

    assert_eq!(collected, vec![102, 103]);
}

#[test]
fn transaction_round_trip_preserves_position() {
    let store = empty_store();
    let network = test_network();

    let lcm = make_ledger(
        101,
        vec![
            make_tx(1, true, vec![]),
            make_tx(2, true, vec![contract_event(test_contract_id(1), "COUNTER")]),
        ],
    );
    ingest(&store, &lcm);

    for (index, record) in lcm.transactions.iter().enumerate() {
        let hash = record.envelope.hash(&network);
        let view = store.get_transaction(&hash).unwrap().unwrap();

        assert_eq!(view.ledger, 101);
        assert_eq!(view.application_order, index as u32 + 1);
        assert_eq!(view.close_time, close_time(101));
        assert!(view.successful);
        assert!(!view.fee_bump);
        assert_eq!(view.envelope, record.envelope.encode());
        assert_eq!(view.result, record.result.encode());
        assert_eq!(view.meta, record.meta.encode());
    }
}

#[test]
fn failed_transactions_are_looked_up_but_not_scanned() {
    let store = empty_store();
    let network = test_network();

    let failing = make_tx(9, false, vec![contract_event(test_contract_id(2), "BOOM")]);
    let hash = failing.envelope.hash(&network);

    let lcm = make_ledger(102, vec![failing]);
    ingest(&store, &lcm);

    // the transaction index still answers, reporting the failure
    let view = store.get_transaction(&hash).unwrap().unwrap();
    assert!(!view.successful);

    // but the event index never saw it
    assert!(collect_events(&store, full_range(), &[]).is_empty());
    assert_eq!(store.stats().unwrap().events, 0);
}

#[test]
fn unknown_transaction_is_absent() {
    let store = empty_store();
    ingest(&store, &make_simple_ledger(101, test_contract_id(1)));

    assert_eq!(store.get_transaction(&[0xaa; 32]).unwrap(), None);
}

#[test]
fn dangling_transaction_row_is_corrupt_data() {
    let store = empty_store();

    // index rows claim a transaction the stored blob does not have
    let indexed = make_ledger(101, vec![make_tx(1, true, vec![])]);
    let stored = make_ledger(101, vec![]);

    let writer = store.start_writer().unwrap();
    writer.insert_ledger(&stored.to_raw()).unwrap();
    writer.insert_transactions(&indexed).unwrap();
    writer.commit().unwrap();

    let hash = indexed.transactions[0].envelope.hash(&test_network());
    let err = store.get_transaction(&hash).unwrap_err();

    assert!(matches!(
        StoreError::from(err),
        StoreError::TxPositionOutOfRange { ledger: 101, tx: 1 }
    ));
}

#[test]
fn scan_cursors_are_strictly_increasing_and_contained() {
    let store = empty_store();

    let contract = test_contract_id(1);
    for seq in 101..=104 {
        let lcm = make_ledger(
            seq,
            vec![
                make_tx(seq as i64 * 10 + 1, true, vec![
                    contract_event(contract, "A"),
                    system_event(),
                ]),
                make_tx(seq as i64 * 10 + 2, true, vec![contract_event(contract, "B")]),
            ],
        );
        ingest(&store, &lcm);
    }

    let range = CursorRange {
        start: Cursor {
            ledger: 102,
            tx: 1,
            event: 1,
        },
        end: Cursor {
            ledger: 104,
            tx: 1,
            event: 0,
        },
    };

    let seen = collect_events(&store, range, &[]);
    assert!(!seen.is_empty());

    for window in seen.windows(2) {
        assert!(window[0].cursor < window[1].cursor);
    }

    for event in &seen {
        assert!(range.contains(event.cursor));
    }

    // the partially covered boundary transactions behave per the half-open
    // contract: (102,1,0) is before the range, (104,1,0) is its end
    assert_eq!(
        seen.first().unwrap().cursor,
        Cursor {
            ledger: 102,
            tx: 1,
            event: 1
        }
    );
    assert_eq!(
        seen.last().unwrap().cursor,
        Cursor {
            ledger: 103,
            tx: 2,
            event: 0
        }
    );
}

#[test]
fn contract_filter_is_sound() {
    let store = empty_store();

    let wanted = test_contract_id(1);
    let other = test_contract_id(2);

    let lcm = make_ledger(
        103,
        vec![make_tx(1, true, vec![
            contract_event(wanted, "COUNTER"),
            contract_event(other, "NOISE"),
            system_event(),
        ])],
    );
    ingest(&store, &lcm);

    let seen = collect_events(&store, full_range(), &[wanted]);

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].contract_id, Some(wanted));
    assert_eq!(
        seen[0].cursor,
        Cursor {
            ledger: 103,
            tx: 1,
            event: 0
        }
    );

    // filtering on both contracts picks up the second event too
    let seen = collect_events(&store, full_range(), &[wanted, other]);
    assert_eq!(seen.len(), 2);
}

#[test]
fn scan_terminates_when_visitor_declines() {
    let store = empty_store();

    for seq in 101..=105 {
        ingest(&store, &make_simple_ledger(seq, test_contract_id(1)));
    }

    let mut seen = vec![];
    store
        .get_events(full_range(), &[], &NeverCancel, &mut |_, cursor, _, _| {
            seen.push(cursor);
            seen.len() < 2
        })
        .unwrap();

    assert_eq!(seen.len(), 2);
}

#[test]
fn scan_aborts_on_cancellation() {
    let store = empty_store();
    ingest(&store, &make_simple_ledger(101, test_contract_id(1)));

    let err = store
        .get_events(full_range(), &[], &AlwaysCancel, &mut |_, _, _, _| true)
        .unwrap_err();

    assert!(matches!(StoreError::from(err), StoreError::Cancelled));
}

#[test]
fn scan_skips_ledgers_trimmed_under_it() {
    let store = empty_store();

    // event rows exist but the blob is gone, as after a concurrent trim
    let lcm = make_simple_ledger(101, test_contract_id(1));
    let writer = store.start_writer().unwrap();
    writer.insert_events(&lcm).unwrap();
    writer.commit().unwrap();

    assert!(collect_events(&store, full_range(), &[]).is_empty());
    assert!(
        collect_events(&store, full_range(), &[test_contract_id(1)]).is_empty()
    );
}

#[test]
fn retention_trims_every_table() {
    let store = empty_store();
    let network = test_network();
    let window = 5u32;

    let mut hashes = vec![];
    for seq in 101..=110 {
        let lcm = make_simple_ledger(seq, test_contract_id(1));
        hashes.push((seq, lcm.transactions[0].envelope.hash(&network)));
        ingest(&store, &lcm);

        let latest = lcm.sequence();
        if latest + 1 > window {
            store.trim_before(latest + 1 - window).unwrap();
        }
    }

    let bounds = store.bounds().unwrap().unwrap();
    assert_eq!(bounds.oldest.sequence, 106);
    assert_eq!(bounds.latest.sequence, 110);

    let stats = store.stats().unwrap();
    assert_eq!(stats.ledgers, window as u64);
    assert_eq!(stats.transactions, window as u64);
    assert_eq!(stats.events, window as u64);

    for (seq, hash) in hashes {
        let found = store.get_transaction(&hash).unwrap();
        if seq < 106 {
            assert_eq!(found, None, "ledger {seq} should be trimmed");
        } else {
            assert_eq!(found.unwrap().ledger, seq);
        }
    }

    let seen = collect_events(&store, full_range(), &[test_contract_id(1)]);
    assert_eq!(seen.len(), window as usize);
    assert!(seen.iter().all(|x| x.cursor.ledger >= 106));
}

#[test]
fn uncommitted_ingest_leaves_no_trace() {
    let store = empty_store();
    let lcm = make_simple_ledger(101, test_contract_id(1));
    let hash = lcm.transactions[0].envelope.hash(&test_network());

    {
        let writer = store.start_writer().unwrap();
        writer.insert_ledger(&lcm.to_raw()).unwrap();
        writer.insert_transactions(&lcm).unwrap();
        writer.insert_events(&lcm).unwrap();
        writer.set_latest_ledger(101).unwrap();
        // dropped without commit, as after a mid-ingest failure
    }

    assert_eq!(store.bounds().unwrap(), None);
    assert_eq!(store.latest_ledger().unwrap(), None);
    assert_eq!(store.get_transaction(&hash).unwrap(), None);
    assert!(collect_events(&store, full_range(), &[]).is_empty());

    let stats = store.stats().unwrap();
    assert_eq!(stats.ledgers, 0);
    assert_eq!(stats.transactions, 0);
    assert_eq!(stats.events, 0);
}

#[test]
fn event_migration_matches_fresh_ingest() {
    let network = test_network();
    let contract = test_contract_id(3);

    let ledgers: Vec<_> = (101..=105)
        .map(|seq| {
            make_ledger(
                seq,
                vec![
                    make_tx(seq as i64 * 10 + 1, true, vec![contract_event(contract, "A")]),
                    make_tx(seq as i64 * 10 + 2, false, vec![contract_event(contract, "B")]),
                    make_tx(seq as i64 * 10 + 3, true, vec![]),
                ],
            )
        })
        .collect();

    // fully ingested store
    let fresh = LedgerStore::in_memory(network.clone()).unwrap();
    for lcm in &ledgers {
        ingest(&fresh, lcm);
    }

    // blob-only store, events rebuilt by the migration
    let migrated = LedgerStore::in_memory(network).unwrap();
    for lcm in &ledgers {
        let writer = migrated.start_writer().unwrap();
        writer.insert_ledger(&lcm.to_raw()).unwrap();
        writer.set_latest_ledger(lcm.sequence()).unwrap();
        writer.commit().unwrap();
    }

    let mut migrations: Vec<Box<dyn Migration<LedgerStore>>> = vec![
        Box::new(EventIndexMigration {
            retention_window: 100,
        }),
        Box::new(TransactionIndexMigration {
            retention_window: 100,
        }),
    ];
    argus_core::run_pending(&migrated, &mut migrations).unwrap();

    assert_eq!(
        collect_events(&fresh, full_range(), &[]),
        collect_events(&migrated, full_range(), &[])
    );
    assert_eq!(
        fresh.stats().unwrap().events,
        migrated.stats().unwrap().events
    );

    // markers recorded; a second run is a no-op
    assert!(migrated.migration_completed("event_index").unwrap());
    assert!(migrated.migration_completed("transaction_index").unwrap());
    argus_core::run_pending(&migrated, &mut migrations).unwrap();
}

#[test]
fn migration_range_respects_retention() {
    let network = test_network();
    let contract = test_contract_id(4);

    let store = LedgerStore::in_memory(network).unwrap();
    for seq in 101..=110 {
        let lcm = make_simple_ledger(seq, contract);
        let writer = store.start_writer().unwrap();
        writer.insert_ledger(&lcm.to_raw()).unwrap();
        writer.set_latest_ledger(seq).unwrap();
        writer.commit().unwrap();
    }

    let mut migrations: Vec<Box<dyn Migration<LedgerStore>>> =
        vec![Box::new(EventIndexMigration {
            retention_window: 4,
        })];
    argus_core::run_pending(&store, &mut migrations).unwrap();

    let seen = collect_events(&store, full_range(), &[]);
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|x| x.cursor.ledger >= 106));
}

#[test]
fn event_index_rebuild_round_trip() {
    let store = empty_store();
    let contract = test_contract_id(5);

    for seq in 101..=103 {
        ingest(&store, &make_simple_ledger(seq, contract));
    }

    let before = collect_events(&store, full_range(), &[contract]);
    assert_eq!(before.len(), 3);

    store.clear_event_index().unwrap();
    assert_eq!(store.stats().unwrap().events, 0);
    assert!(!store.migration_completed("event_index").unwrap());

    let mut migrations: Vec<Box<dyn Migration<LedgerStore>>> =
        vec![Box::new(EventIndexMigration {
            retention_window: 100,
        })];
    argus_core::run_pending(&store, &mut migrations).unwrap();

    assert_eq!(collect_events(&store, full_range(), &[contract]), before);
}

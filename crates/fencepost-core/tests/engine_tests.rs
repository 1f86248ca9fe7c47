mod common;

use std::collections::BTreeSet;

use common::{collection_of, def, ids, now, tags, Call, Harness};
use fencepost_core::{
    GeofenceCollection, RegistrationRequestMap, SyncMarker, TriggerType, UpdateDelta,
};
use pretty_assertions::assert_eq;

fn synced() -> SyncMarker {
    SyncMarker::from_millis(50)
}

fn upserts(defs: Vec<fencepost_core::GeofenceDefinition>) -> UpdateDelta {
    UpdateDelta::new(defs, BTreeSet::new())
}

// ── No-op and first-sync behaviour ───────────────────────────────

#[test]
fn test_no_delta_after_prior_sync_touches_nothing() {
    let h = Harness::new(Some(collection_of([def(1, 1)])));

    let outcome = h.engine.process_update(synced(), None, &tags(&[])).unwrap();

    assert!(h.log.calls().is_empty());
    assert!(!outcome.reset);
    assert!(!outcome.merged);
}

#[test]
fn test_first_sync_without_delta_only_resets() {
    let h = Harness::new(None);

    let outcome = h.engine.process_update(SyncMarker::Never, None, &tags(&[])).unwrap();

    assert_eq!(h.log.calls(), vec![Call::RegistrarReset, Call::StoreReset]);
    assert!(outcome.reset);
}

#[test]
fn test_first_sync_resets_before_any_other_call() {
    let h = Harness::new(Some(collection_of([def(3, 1)])));

    h.engine
        .process_update(SyncMarker::Never, Some(&upserts(vec![def(4, 1)])), &tags(&[]))
        .unwrap();

    let calls = h.log.calls();
    assert_eq!(&calls[..2], &[Call::RegistrarReset, Call::StoreReset]);
    assert_eq!(calls.iter().filter(|c| **c == Call::RegistrarReset).count(), 1);
    assert_eq!(calls.iter().filter(|c| **c == Call::StoreReset).count(), 1);
}

#[test]
fn test_first_sync_discards_stale_state() {
    let h = Harness::new(Some(collection_of([def(3, 1)])));

    h.engine
        .process_update(SyncMarker::Never, Some(&upserts(vec![def(4, 1)])), &tags(&[]))
        .unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![4]);
}

#[test]
fn test_first_sync_with_empty_result_short_circuits() {
    let h = Harness::new(None);

    let outcome = h
        .engine
        .process_update(SyncMarker::Never, Some(&UpdateDelta::default()), &tags(&[]))
        .unwrap();

    assert_eq!(
        h.log.calls(),
        vec![Call::RegistrarReset, Call::StoreReset, Call::StoreGet]
    );
    assert!(outcome.merged);
    assert_eq!(outcome.persisted, 0);
}

#[test]
fn test_first_sync_with_only_invalid_upserts_short_circuits() {
    let h = Harness::new(None);
    let broken = def(9, 0);

    h.engine
        .process_update(SyncMarker::Never, Some(&upserts(vec![broken])), &tags(&[]))
        .unwrap();

    assert!(h.log.saved().is_empty());
    assert!(h.log.registered().is_empty());
}

#[test]
fn test_empty_authoritative_delta_after_prior_sync_still_writes() {
    let h = Harness::new(None);

    h.engine
        .process_update(synced(), Some(&UpdateDelta::default()), &tags(&[]))
        .unwrap();

    assert_eq!(h.log.saved(), vec![GeofenceCollection::new()]);
    assert_eq!(h.log.registered(), vec![Vec::<(i64, u32)>::new()]);
}

// ── Merge semantics ──────────────────────────────────────────────

#[test]
fn test_merge_adds_to_existing_collection() {
    let h = Harness::new(Some(collection_of([def(7, 1)])));

    h.engine
        .process_update(synced(), Some(&upserts(vec![def(10, 1)])), &tags(&[]))
        .unwrap();

    let calls = h.log.calls();
    assert_eq!(calls[0], Call::StoreGet);
    assert_eq!(ids(&h.log.saved()[0]), vec![7, 10]);
    assert_eq!(h.log.registered(), vec![vec![(7, 0), (10, 0)]]);
}

#[test]
fn test_save_happens_before_register() {
    let h = Harness::new(None);

    h.engine
        .process_update(synced(), Some(&upserts(vec![def(1, 1)])), &tags(&[]))
        .unwrap();

    let calls = h.log.calls();
    assert!(matches!(calls[1], Call::StoreSave(_)));
    assert!(matches!(calls[2], Call::Register { .. }));
    assert_eq!(calls.len(), 3);
}

#[test]
fn test_registrar_receives_full_collection() {
    let h = Harness::new(None);
    let hidden = def(2, 1).with_tag("members");

    h.engine
        .process_update(synced(), Some(&upserts(vec![def(1, 1), hidden])), &tags(&[]))
        .unwrap();

    let Some(Call::Register { keys, collection }) = h.log.calls().pop() else {
        panic!("expected a register call");
    };
    assert_eq!(keys, vec![(1, 0)]);
    assert_eq!(ids(&collection), vec![1, 2]);
}

#[test]
fn test_upsert_replaces_existing_definition() {
    let h = Harness::new(Some(collection_of([def(5, 1)])));

    h.engine
        .process_update(synced(), Some(&upserts(vec![def(5, 3)])), &tags(&[]))
        .unwrap();

    assert_eq!(h.stored().unwrap().get(5).unwrap().regions.len(), 3);
    assert_eq!(h.log.registered(), vec![vec![(5, 0), (5, 1), (5, 2)]]);
}

#[test]
fn test_deletion_removes_existing_and_beats_stale_upsert() {
    let h = Harness::new(Some(collection_of([def(1, 1), def(2, 1)])));
    let delta = UpdateDelta::new(vec![def(2, 1), def(3, 1)], BTreeSet::from([1, 2]));

    let outcome = h.engine.process_update(synced(), Some(&delta), &tags(&[])).unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![3]);
    assert_eq!(outcome.merge.deleted, 2);
}

#[test]
fn test_invalid_upsert_tombstones_existing_id() {
    let h = Harness::new(Some(collection_of([def(4, 2), def(6, 1)])));

    let outcome = h
        .engine
        .process_update(synced(), Some(&upserts(vec![def(4, 0)])), &tags(&[]))
        .unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![6]);
    assert_eq!(outcome.merge.tombstoned, 1);
}

#[test]
fn test_unknown_trigger_type_tombstones() {
    let h = Harness::new(Some(collection_of([def(4, 1)])));
    let mut unknown = def(4, 1);
    unknown.trigger_type = TriggerType::Unknown;

    h.engine
        .process_update(synced(), Some(&upserts(vec![unknown])), &tags(&[]))
        .unwrap();

    assert!(h.stored().unwrap().is_empty());
}

#[test]
fn test_implausible_region_tombstones() {
    let h = Harness::new(Some(collection_of([def(4, 1)])));
    let mut far = def(4, 2);
    far.regions[1].latitude = 123.0;

    h.engine
        .process_update(synced(), Some(&upserts(vec![far])), &tags(&[]))
        .unwrap();

    assert!(!h.stored().unwrap().contains(4));
}

// ── Expiry ───────────────────────────────────────────────────────

#[test]
fn test_expired_entries_from_storage_are_culled() {
    let stale = def(1, 1).with_expiry(now() - chrono::Duration::seconds(1));
    let h = Harness::new(Some(collection_of([stale, def(2, 1)])));

    let outcome = h
        .engine
        .process_update(synced(), Some(&UpdateDelta::default()), &tags(&[]))
        .unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![2]);
    assert_eq!(outcome.culled, 1);
}

#[test]
fn test_expired_entries_from_delta_are_dropped() {
    let h = Harness::new(Some(collection_of([def(1, 1)])));
    let expiring_now = def(1, 2).with_expiry(now());
    let future = def(2, 1).with_expiry(now() + chrono::Duration::days(1));

    h.engine
        .process_update(synced(), Some(&upserts(vec![expiring_now, future])), &tags(&[]))
        .unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![2]);
}

// ── Tags: persistence vs registration ────────────────────────────

#[test]
fn test_unsubscribed_tag_is_persisted_but_not_registered() {
    let h = Harness::new(None);
    let delta = upserts(vec![def(1, 1), def(2, 2).with_tag("gold"), def(3, 1).with_tag("silver")]);

    h.engine.process_update(synced(), Some(&delta), &tags(&["silver"])).unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![1, 2, 3]);
    assert_eq!(h.log.registered(), vec![vec![(1, 0), (3, 0)]]);
}

#[test]
fn test_untagged_merge_registers_every_geofence() {
    let h = Harness::new(Some(collection_of([def(7, 1)])));

    h.engine
        .process_update(
            SyncMarker::from_millis(50),
            Some(&upserts(vec![def(10, 1)])),
            &BTreeSet::new(),
        )
        .unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![7, 10]);
    assert_eq!(h.log.registered()[0].len(), 2);
}

// ── Port failures ────────────────────────────────────────────────

#[test]
fn test_store_failure_propagates_and_skips_register() {
    let h = Harness::failing(None, true, false);

    let err = h
        .engine
        .process_update(synced(), Some(&upserts(vec![def(1, 1)])), &tags(&[]))
        .unwrap_err();

    assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    assert!(h.log.registered().is_empty());
}

#[test]
fn test_register_failure_propagates_after_save() {
    let h = Harness::failing(None, false, true);

    let err = h
        .engine
        .process_update(synced(), Some(&upserts(vec![def(1, 1)])), &tags(&[]))
        .unwrap_err();

    assert!(err.is_port_error());
    // The save is not rolled back.
    assert_eq!(ids(&h.stored().unwrap()), vec![1]);
}

// ── reregister_active ────────────────────────────────────────────

#[test]
fn test_reregister_uses_new_tags_without_writing() {
    let h = Harness::new(Some(collection_of([def(1, 1), def(2, 1).with_tag("gold")])));

    h.engine.reregister_active(&tags(&["gold"])).unwrap();

    assert!(h.log.saved().is_empty());
    assert_eq!(h.log.registered(), vec![vec![(1, 0), (2, 0)]]);
}

#[test]
fn test_reregister_with_empty_store_still_registers() {
    let h = Harness::new(None);

    h.engine.reregister_active(&tags(&[])).unwrap();

    assert_eq!(h.log.calls().len(), 2);
    assert_eq!(h.log.registered(), vec![Vec::<(i64, u32)>::new()]);
}

#[test]
fn test_reregister_does_not_cull() {
    let stale = def(1, 1).with_expiry(now() - chrono::Duration::hours(1));
    let h = Harness::new(Some(collection_of([stale])));

    h.engine.reregister_active(&tags(&[])).unwrap();

    assert_eq!(h.log.registered(), vec![vec![(1, 0)]]);
}

// ── clear_regions ────────────────────────────────────────────────

#[test]
fn test_clear_none_or_empty_is_noop() {
    let h = Harness::new(Some(collection_of([def(1, 1)])));

    h.engine.clear_regions(None).unwrap();
    h.engine.clear_regions(Some(&RegistrationRequestMap::new())).unwrap();

    assert!(h.log.calls().is_empty());
}

#[test]
fn test_clearing_one_of_several_regions_keeps_the_rest() {
    let current = collection_of([def(1, 3)]);
    let h = Harness::new(Some(current.clone()));
    let doomed = RegistrationRequestMap::for_pairs(&current, [(1, 1)]);

    h.engine.clear_regions(Some(&doomed)).unwrap();

    let stored = h.stored().unwrap();
    let remaining: Vec<u32> = stored.get(1).unwrap().regions.iter().map(|r| r.index).collect();
    assert_eq!(remaining, vec![0, 2]);
    assert_eq!(h.log.registered(), vec![vec![(1, 0), (1, 2)]]);
}

#[test]
fn test_clearing_last_region_drops_definition() {
    let current = collection_of([def(1, 1), def(2, 1)]);
    let h = Harness::new(Some(current.clone()));
    let doomed = RegistrationRequestMap::for_pairs(&current, [(1, 0)]);

    h.engine.clear_regions(Some(&doomed)).unwrap();

    assert_eq!(ids(&h.stored().unwrap()), vec![2]);
}

#[test]
fn test_clear_filters_by_known_tags() {
    let current = collection_of([
        def(1, 2),
        def(2, 1).with_tag("gold"),
        def(3, 1).with_tag("blue"),
    ]);
    let h = Harness::with_known_tags(Some(current.clone()), &["gold"]);
    let doomed = RegistrationRequestMap::for_pairs(&current, [(1, 0)]);

    h.engine.clear_regions(Some(&doomed)).unwrap();

    assert_eq!(
        h.log.calls(),
        vec![
            Call::StoreGet,
            Call::StoreSave(h.stored().unwrap()),
            Call::Register {
                keys: vec![(1, 1), (2, 0)],
                collection: h.stored().unwrap(),
            },
        ]
    );
}

// ── reset_store ──────────────────────────────────────────────────

#[test]
fn test_reset_store_never_touches_registrar() {
    let h = Harness::new(Some(collection_of([def(1, 1)])));

    h.engine.reset_store().unwrap();

    assert_eq!(h.log.calls(), vec![Call::StoreReset]);
    assert!(h.stored().is_none());
}

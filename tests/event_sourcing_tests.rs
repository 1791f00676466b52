//! Event Sourcing Integration Tests
//!
//! Tests for the normalization algebra and the entity store:
//! - fold/normalize/invert laws over pseudo-random histories
//! - Commit, compaction and undo/redo scenarios
//! - Law enforcement and subscriptions

use std::sync::Arc;

use parking_lot::Mutex;

use patchlog::algebra::{apply, fold, invert, is_normal_form, normalize, Patch};
use patchlog::entity_store::{Change, EntityStore, IdPolicy, LawViolation, StoreError};
use patchlog::types::{CommitMeta, Event, State, Value};

/// Deterministic linear congruential generator
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

/// Random history over a small id space so ids collide often
fn random_history(rng: &mut Lcg, len: usize) -> Vec<Event> {
    (0..len)
        .map(|_| {
            let id = format!("e{}", rng.below(6));
            let value = rng.below(100) as i64;
            match rng.below(3) {
                0 => Event::create(id, value),
                1 => Event::update(id, value),
                _ => Event::delete(id),
            }
        })
        .collect()
}

fn random_state(rng: &mut Lcg) -> State {
    fold(&random_history(rng, 8))
}

#[test]
fn test_fold_of_normal_form_equals_fold_of_raw() {
    let mut rng = Lcg(7);
    for _ in 0..500 {
        let len = rng.below(40) as usize;
        let history = random_history(&mut rng, len);
        assert_eq!(fold(&normalize(&history)), fold(&history), "history: {:?}", history);
    }
}

#[test]
fn test_normalize_is_idempotent() {
    let mut rng = Lcg(11);
    for _ in 0..500 {
        let len = rng.below(40) as usize;
        let once = normalize(&random_history(&mut rng, len));
        assert_eq!(normalize(&once), once);
        assert!(is_normal_form(&once));
    }
}

#[test]
fn test_normal_form_shape() {
    let mut rng = Lcg(13);
    for _ in 0..200 {
        let nf = normalize(&random_history(&mut rng, 30));
        let mut seen = std::collections::HashSet::new();
        for (i, event) in nf.iter().enumerate() {
            match event {
                Event::Create { id, .. } => assert!(seen.insert(id.clone())),
                Event::Update { id, .. } => {
                    // an update directly follows its own create
                    assert!(matches!(&nf[i - 1], Event::Create { id: prev, .. } if prev == id));
                }
                Event::Delete { .. } => panic!("delete in normal form"),
            }
        }
    }
}

#[test]
fn test_invert_restores_base() {
    let mut rng = Lcg(17);
    for _ in 0..500 {
        let base = random_state(&mut rng);
        let len = rng.below(20) as usize;
        let events = random_history(&mut rng, len);

        let mut round_trip = events.clone();
        round_trip.extend(invert(&events, &base));
        assert_eq!(apply(base.clone(), &round_trip), base, "events: {:?}", events);
    }
}

#[test]
fn test_compact_preserves_state() {
    let mut rng = Lcg(19);
    for _ in 0..100 {
        let mut store = EntityStore::new();
        store.commit(random_history(&mut rng, 25)).unwrap();
        store.commit(random_history(&mut rng, 10)).unwrap();
        let before = store.state();

        store.compact();

        assert_eq!(store.state(), before);
        assert_eq!(store.len(), before.len());
        assert!(store
            .history()
            .iter()
            .all(|e| matches!(e, Event::Create { .. })));
    }
}

#[test]
fn test_mixed_commit_scenario() {
    let mut store = EntityStore::new();
    store
        .commit([
            Event::create("u1", 1),
            Event::update("u1", 2),
            Event::delete("u1"),
            Event::create("u2", 3),
        ])
        .unwrap();

    let mut expected = State::new();
    expected.insert("u2".to_string(), Value::from(3));
    assert_eq!(store.state(), expected);
}

#[test]
fn test_lone_update_scenario() {
    let mut store = EntityStore::new();
    store.commit([Event::update("x", 1)]).unwrap();
    assert!(store.state().is_empty());
}

#[test]
fn test_patch_undo_redo_scenario() {
    let mut store = EntityStore::new();
    let patch = Patch::new([Event::create("u1", 1), Event::update("u1", 2)]);

    let committed = store.commit_patch(&patch).unwrap();
    assert_eq!(store.state().get("u1"), Some(&Value::from(2)));

    store.undo(&committed).unwrap();
    assert!(store.state().is_empty());

    store.redo(&committed).unwrap();
    assert_eq!(store.state().get("u1"), Some(&Value::from(2)));
}

#[test]
fn test_undo_random_patches_restores_state() {
    let mut rng = Lcg(23);
    for _ in 0..200 {
        let mut store = EntityStore::new();
        store.commit(random_history(&mut rng, 12)).unwrap();
        let before = store.state();

        let patch = Patch::new(random_history(&mut rng, 8));
        let committed = store.commit_patch(&patch).unwrap();
        store.undo(&committed).unwrap();

        assert_eq!(store.state(), before, "patch: {:?}", patch);
    }
}

#[test]
fn test_law_rejection_leaves_store_untouched() {
    let mut store = EntityStore::with_law(IdPolicy::new().allow_prefix("user:"));
    store.commit([Event::create("user:1", 1)]).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = store.subscribe(move |change, _| sink.lock().push(change.clone()));
    seen.lock().clear();

    let history = store.history().to_vec();
    let err = store
        .commit([Event::update("user:1", 5), Event::create("team:1", 1)])
        .unwrap_err();

    let StoreError::Law(LawViolation { law, .. }) = err;
    assert_eq!(law, "id-policy");
    assert_eq!(store.history(), history.as_slice());
    assert!(seen.lock().is_empty());
}

#[test]
fn test_subscribers_see_snapshot_then_events_with_meta() {
    let mut store = EntityStore::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = store.subscribe(move |change, meta| {
        sink.lock().push((change.clone(), meta.actor.clone()))
    });

    let meta = CommitMeta::new().with_actor("alice").with_trace_id("t-9");
    store.commit_with([Event::create("a", 1)], &meta).unwrap();
    store.compact();

    assert_eq!(
        *seen.lock(),
        vec![
            (Change::Snapshot, None),
            (Change::Committed(Event::create("a", 1)), Some("alice".to_string())),
            (Change::Snapshot, None),
        ]
    );
}

#[test]
fn test_unsubscribe() {
    let mut store = EntityStore::new();
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let sub = store.subscribe(move |_, _| *counter.lock() += 1);

    store.commit([Event::create("a", 1)]).unwrap();
    assert_eq!(*count.lock(), 2);

    assert!(sub.unsubscribe());
    store.commit([Event::create("b", 1)]).unwrap();
    assert_eq!(*count.lock(), 2);
}

#[test]
fn test_events_roundtrip_as_json_lines() {
    let events = vec![
        Event::create("doc", Value::map([("title", "hello")])),
        Event::update("doc", Value::Binary(vec![0, 159, 146, 150])),
        Event::delete("doc"),
    ];
    for event in &events {
        let line = event.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(&Event::from_json_line(&line).unwrap(), event);
    }
}

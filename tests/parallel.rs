use std::sync::atomic::{AtomicUsize, Ordering};

use ecm_framework::{Component, EcmManager, Layout, Tag, With};

#[derive(Default, Clone, Copy)]
struct Counter(u32);
impl Component for Counter {}

#[derive(Default, Clone, Copy)]
struct Value(usize);
impl Component for Value {}

struct Marked;
impl Tag for Marked {}

fn make_manager(workers: usize) -> EcmManager {
    let mut layout = Layout::new();
    layout.register_component::<Counter>().unwrap();
    layout.register_component::<Value>().unwrap();
    layout.register_tag::<Marked>().unwrap();
    EcmManager::with_workers(layout, workers)
}

#[test]
fn parallel_pass_touches_every_entity_exactly_once() {
    let mut manager = make_manager(4);
    let ids: Vec<_> = (0..64)
        .map(|_| {
            let id = manager.add_entity();
            manager.add_component(id, Counter(0));
            id
        })
        .collect();

    manager.for_matching_signature::<(&mut Counter,), _>(true, |_, (counter,)| {
        counter.0 += 1;
    });

    for id in ids {
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, 1);
    }
}

#[test]
fn parallel_pass_skips_dead_and_unmatched_entities() {
    let mut manager = make_manager(4);
    for i in 0..48 {
        let id = manager.add_entity();
        manager.add_component(id, Counter(0));
        if i % 3 == 0 {
            manager.add_tag::<Marked>(id);
        }
    }
    for id in 32..48 {
        manager.delete_entity(id);
    }

    let visited = AtomicUsize::new(0);
    manager.for_matching_signature::<(&mut Counter, With<Marked>), _>(true, |_, (counter, _)| {
        counter.0 += 1;
        visited.fetch_add(1, Ordering::Relaxed);
    });

    // Entities 0, 3, ..., 30 are alive and marked.
    assert_eq!(visited.load(Ordering::Relaxed), 11);
    for id in 0..32 {
        let expected = u32::from(id % 3 == 0);
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, expected);
    }
}

#[test]
fn parallel_flag_without_pool_degrades_to_sequential() {
    let mut manager = make_manager(1);
    assert!(manager.worker_pool().is_none());

    for _ in 0..17 {
        let id = manager.add_entity();
        manager.add_component(id, Counter(0));
    }

    manager.for_matching_signature::<(&mut Counter,), _>(true, |_, (counter,)| {
        counter.0 += 1;
    });

    for id in 0..17 {
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, 1);
    }
}

#[test]
fn repeated_parallel_bursts_reuse_the_pool() {
    let mut manager = make_manager(2);
    for _ in 0..100 {
        let id = manager.add_entity();
        manager.add_component(id, Counter(0));
    }

    for _ in 0..4 {
        manager.for_matching_signature::<(&mut Counter,), _>(true, |_, (counter,)| {
            counter.0 += 1;
        });
    }

    for id in 0..100 {
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, 4);
    }
}

#[test]
fn nested_parallel_queries_run_on_fresh_cohorts() {
    let mut manager = make_manager(2);
    let count = 32;
    for i in 0..count {
        let id = manager.add_entity();
        manager.add_component(id, Value(i));
    }

    let pairs_seen = AtomicUsize::new(0);

    // Each outer callback runs on a worker thread and launches its own
    // parallel pass; the fresh cohort per start makes this deadlock-free.
    manager.for_matching_simple::<(&Value,), _>(true, |_, inner_manager| {
        let pairs_seen = &pairs_seen;
        inner_manager.for_matching_signature::<(&Value,), _>(true, |_, (_value,)| {
            pairs_seen.fetch_add(1, Ordering::Relaxed);
        });
    });

    assert_eq!(pairs_seen.load(Ordering::Relaxed), count * count);
}

#[test]
fn parallel_stored_functions_match_current_state() {
    let mut manager = make_manager(8);
    let mut ids = Vec::new();
    for _ in 0..24 {
        let id = manager.add_entity();
        manager.add_component(id, Counter(0));
        ids.push(id);
    }

    let f0 = manager.add_for_matching_function::<(&mut Counter,), _>(|_, (counter,)| {
        counter.0 += 1;
    });

    manager.call_for_matching_functions(true);
    for &id in &ids {
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, 1);
    }

    for &id in &ids[4..] {
        manager.delete_entity(id);
    }

    assert!(manager.call_for_matching_function(f0, true));
    for &id in &ids[..4] {
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, 2);
    }
}

#[test]
fn parallel_matching_set_preserves_signature_order() {
    let mut manager = make_manager(4);
    for i in 0..40 {
        let id = manager.add_entity();
        manager.add_component(id, Counter(0));
        if i % 2 == 0 {
            manager.add_component(id, Value(i));
        }
    }

    let first_phase = AtomicUsize::new(0);
    let order_violations = AtomicUsize::new(0);

    let mut set = ecm_framework::MatchingSet::new();
    {
        let first_phase = &first_phase;
        set.add::<(&mut Counter,), _>(move |_, (counter,)| {
            counter.0 += 1;
            first_phase.fetch_add(1, Ordering::SeqCst);
        });
    }
    {
        let first_phase = &first_phase;
        let order_violations = &order_violations;
        set.add::<(&mut Counter, &Value), _>(move |_, (counter, _value)| {
            // Every first-signature callback has already run.
            if first_phase.load(Ordering::SeqCst) != 40 {
                order_violations.fetch_add(1, Ordering::SeqCst);
            }
            counter.0 += 10;
        });
    }
    manager.run_matching_set(&set, true);

    assert_eq!(order_violations.load(Ordering::SeqCst), 0);
    for id in 0..40 {
        let expected = if id % 2 == 0 { 11 } else { 1 };
        assert_eq!(manager.get_component::<Counter>(id).unwrap().0, expected);
    }
}

//! Concurrency discipline: parallel writers never tear the store.

use std::sync::Arc;
use std::thread;

use textsmith::world::WorldStore;

fn world() -> (Arc<WorldStore>, textsmith::world::Entity) {
    let store = WorldStore::new();
    store.seed_if_empty("world/Welcome").expect("seed");
    let ann = store.create_user("Ann", "", "pw").expect("ann");
    (Arc::new(store), ann)
}

#[test]
fn writes_to_distinct_entities_are_all_visible() {
    let (store, ann) = world();
    let mut objects = Vec::new();
    for i in 0..8 {
        let obj = store
            .create_object(&format!("gadget{}", i), "", ann.id)
            .expect("create");
        objects.push(obj.id);
    }

    let mut handles = Vec::new();
    for (i, id) in objects.iter().copied().enumerate() {
        let store = Arc::clone(&store);
        let actor = ann.id;
        handles.push(thread::spawn(move || {
            for round in 0..50 {
                store
                    .set_attribute(actor, id, "counter", &format!("{}-{}", i, round))
                    .expect("set");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("join");
    }

    for (i, id) in objects.iter().copied().enumerate() {
        let entity = store.get(id).expect("get");
        assert_eq!(
            entity.attributes.get("counter").map(String::as_str),
            Some(format!("{}-49", i).as_str())
        );
    }
}

#[test]
fn racing_writes_to_one_attribute_leave_a_complete_value() {
    let (store, ann) = world();
    let obj = store.create_object("gadget", "", ann.id).expect("create");

    let mut handles = Vec::new();
    for value in ["aaaaaaaa", "bbbbbbbb"] {
        let store = Arc::clone(&store);
        let actor = ann.id;
        let id = obj.id;
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                store.set_attribute(actor, id, "label", value).expect("set");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("join");
    }

    // Last writer wins; the value is one input in full, never a mix.
    let label = store
        .get(obj.id)
        .expect("get")
        .attributes
        .get("label")
        .cloned()
        .expect("label present");
    assert!(label == "aaaaaaaa" || label == "bbbbbbbb", "torn value: {}", label);
}

#[test]
fn export_is_a_consistent_cut_under_load() {
    let (store, ann) = world();
    let writer = {
        let store = Arc::clone(&store);
        let actor = ann.id;
        thread::spawn(move || {
            for i in 0..100 {
                store
                    .create_object(&format!("thing{}", i), "", actor)
                    .expect("create");
            }
        })
    };

    for _ in 0..50 {
        let entities = store.export_entities();
        // Every exported entity carries a resolvable FQN in the same cut.
        for entity in &entities {
            assert!(!entity.fqn.is_empty());
        }
    }
    writer.join().expect("join");
    // Welcome + Ann + 100 objects.
    assert_eq!(store.entity_count(), 102);
}

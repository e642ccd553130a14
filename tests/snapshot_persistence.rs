//! Snapshot round trips: a restarted server sees the same world.

use tempfile::TempDir;
use textsmith::engine::handle_line;
use textsmith::persist;
use textsmith::world::{WorldError, WorldStore};

fn built_world() -> WorldStore {
    let store = WorldStore::new();
    store.seed_if_empty("world/Welcome").expect("seed");
    let ann = store
        .create_user("Ann", "A keen builder.", "secret")
        .expect("ann");
    let welcome = store.get_by_fqn("world/Welcome").expect("welcome");
    store.place_if_nowhere(ann.id, welcome.id).expect("place");
    handle_line(&store, ann.id, "build Garden Green and quiet.");
    handle_line(&store, ann.id, "connect Ann/Garden east A mossy gate.");
    handle_line(&store, ann.id, "create trumpet A shiny trumpet.");
    handle_line(
        &store,
        ann.id,
        "set Ann/trumpet play You play a jaunty tune.",
    );
    store
}

#[test]
fn restored_world_is_isomorphic() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("world.json");
    let store = built_world();

    persist::save(&store, &path).expect("save");
    let restored = persist::load(&path).expect("load");

    assert_eq!(restored.entity_count(), store.entity_count());

    let ann = restored
        .find_user("Ann")
        .and_then(|id| restored.get(id).ok())
        .expect("Ann survives");
    let welcome = restored.get_by_fqn("world/Welcome").expect("welcome");
    assert_eq!(ann.location, Some(welcome.id));

    // Behavior survives, not just data: Ann can still walk east and play.
    let moved = handle_line(&restored, ann.id, "east");
    assert_eq!(moved[0].body, "You leave \"Welcome\" via \"east\".");
    let played = handle_line(&restored, ann.id, "play trumpet");
    assert_eq!(played[0].body, "You play a jaunty tune.");
}

#[test]
fn repeated_saves_replace_the_snapshot_atomically() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("world.json");
    let store = built_world();

    persist::save(&store, &path).expect("first save");
    let ann = store.find_user("Ann").expect("ann");
    handle_line(&store, ann, "create ball A red ball.");
    persist::save(&store, &path).expect("second save");

    // Only the snapshot itself remains; no .tmp litter from either save.
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read_dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["world.json".to_string()]);

    let restored = persist::load(&path).expect("load");
    assert!(restored.get_by_fqn("Ann/ball").is_ok());
}

#[test]
fn corrupt_snapshot_refuses_to_load() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("world.json");
    std::fs::write(&path, b"not a snapshot").expect("write");
    assert!(matches!(
        persist::load(&path),
        Err(WorldError::Json(_))
    ));
}

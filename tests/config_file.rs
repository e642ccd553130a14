//! Configuration file lifecycle: init writes a file that load accepts.

use tempfile::TempDir;
use textsmith::config::Config;
use tokio_test::block_on;

#[test]
fn created_default_file_loads_back() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    let path = path.to_str().expect("utf-8 path");

    block_on(Config::create_default(path)).expect("create");
    let config = block_on(Config::load(path)).expect("load");

    assert_eq!(config.server.bind, "127.0.0.1:4000");
    assert_eq!(config.world.snapshot_interval_secs, 60);
    assert_eq!(config.world.default_room_fqn, "world/Welcome");
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nope.toml");
    assert!(block_on(Config::load(path.to_str().expect("utf-8 path"))).is_err());
}

#[test]
fn zero_snapshot_interval_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[world]\nsnapshot_interval_secs = 0\n",
    )
    .expect("write");
    assert!(block_on(Config::load(path.to_str().expect("utf-8 path"))).is_err());
}

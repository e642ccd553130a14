//! Snapshot persistence for the world store.

pub mod snapshot;

pub use snapshot::{load, save, Snapshotter};

//! World snapshots.
//!
//! The whole world is persisted as a single JSON document: a schema version
//! plus the flat entity list. Saves write to a temporary file in the target
//! directory and rename it into place, so a crash mid-write leaves the
//! previous snapshot intact. Loads rebuild every index from the entity list;
//! a snapshot that fails to parse is a fatal error, never a silent reset.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::world::errors::WorldError;
use crate::world::store::WorldStore;
use crate::world::types::Entity;

/// Bumped whenever the entity schema changes shape.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    entities: Vec<Entity>,
}

/// Serialize the store's current entities to `path`, atomically.
pub fn save(store: &WorldStore, path: &Path) -> Result<(), WorldError> {
    let document = SnapshotDocument {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        entities: store.export_entities(),
    };
    let json = serde_json::to_vec_pretty(&document)?;

    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("json.tmp");
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Rebuild a store from a snapshot file. A missing file yields an empty
/// world; a present-but-unreadable one is propagated as an error so the
/// operator decides what to do with it.
pub fn load(path: &Path) -> Result<WorldStore, WorldError> {
    if !path.exists() {
        info!("no snapshot at {}, starting with an empty world", path.display());
        return Ok(WorldStore::new());
    }
    let raw = std::fs::read(path)?;
    let document: SnapshotDocument = serde_json::from_slice(&raw)?;
    if document.version != SNAPSHOT_VERSION {
        warn!(
            "snapshot {} has version {}, expected {}",
            path.display(),
            document.version,
            SNAPSHOT_VERSION
        );
    }
    let store = WorldStore::from_entities(document.entities)?;
    info!(
        "loaded {} entities from {} (saved {})",
        store.entity_count(),
        path.display(),
        document.saved_at
    );
    Ok(store)
}

/// Background task that snapshots the world on a fixed interval. A failed
/// save is logged and retried on the next tick; the world keeps running.
pub struct Snapshotter {
    store: Arc<WorldStore>,
    path: PathBuf,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Snapshotter {
    pub fn new(
        store: Arc<WorldStore>,
        path: PathBuf,
        interval_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            path,
            interval: Duration::from_secs(interval_secs.max(1)),
            shutdown,
        }
    }

    /// Run until the shutdown signal flips, then take one final snapshot.
    pub async fn run(mut self) {
        info!(
            "snapshotting to {} every {}s",
            self.path.display(),
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // the first tick fires immediately
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = save(&self.store, &self.path) {
                        error!("snapshot failed: {}", err);
                    }
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        match save(&self.store, &self.path) {
            Ok(()) => info!("final snapshot written to {}", self.path.display()),
            Err(err) => error!("final snapshot failed: {}", err),
        }
    }
}

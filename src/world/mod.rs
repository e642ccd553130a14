//! The world model: entities, the shared object store, name resolution,
//! and the room/exit graph.

pub mod errors;
pub mod graph;
pub mod resolver;
pub mod store;
pub mod types;

pub use errors::WorldError;
pub use resolver::{ResolutionContext, Scope};
pub use store::{WorldStore, SYSTEM_NAMESPACE};
pub use types::{Entity, EntityId, EntityKind};

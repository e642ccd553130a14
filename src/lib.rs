//! # TextSmith - a multi-user textual world
//!
//! TextSmith is a small MUD/MUSH-style world server. Users connect over a
//! line-oriented TCP protocol, log in, and share a single world of rooms,
//! exits, objects, and other users. Everything is an entity with a unique
//! id and a fully qualified name (`owner/name`); behavior hangs off plain
//! text attributes, which double as verbs (`set Ann/trumpet play ...`,
//! then `play trumpet`).
//!
//! ## Architecture
//!
//! - [`world`] - the entity model, the shared store behind one write lock,
//!   name resolution, and the room/exit graph
//! - [`engine`] - the command interpreter and message fan-out to sessions
//! - [`persist`] - periodic JSON snapshots with atomic replacement
//! - [`server`] - the TCP front end and login handshake
//! - [`config`] - TOML configuration
//!
//! The store is the single source of truth: every mutation takes its write
//! lock once, so readers never observe a half-applied command.

pub mod config;
pub mod engine;
pub mod persist;
pub mod server;
pub mod world;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Process-unique, stable entity identifier. Assigned at creation, never reused.
pub type EntityId = Uuid;

/// Separator between the owner segment and the name segment of an FQN.
pub const FQN_SEPARATOR: char = '/';

/// Object names, attribute names, and usernames must be plain alphanumeric
/// tokens so they tokenize cleanly inside command lines.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Build the globally unique fully-qualified name `owner/name`.
pub fn make_fqn(owner_name: &str, name: &str) -> String {
    format!("{}{}{}", owner_name, FQN_SEPARATOR, name)
}

/// True when a raw token is FQN-shaped (`owner/name`) rather than a bare name.
pub fn looks_like_fqn(token: &str) -> bool {
    token.contains(FQN_SEPARATOR)
}

/// Kind-specific payload carried by every entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    /// A generic user-created item.
    Object,
    /// A location. Rooms have no location of their own; they anchor the
    /// containment tree and connect to each other through exits.
    Room {
        /// Exits originating in this room.
        #[serde(default)]
        exits: Vec<EntityId>,
    },
    /// A one-directional link between rooms. Exits sit inside their source
    /// room like any object so they can be looked at and described.
    Exit {
        /// FQN of the destination room. Resolved on every use; a dangling
        /// value is tolerated and reported as broken when traversed.
        destination_fqn: String,
        /// Message shown to the traveller as they use the exit.
        leave_user: String,
        /// Message shown to the source room as the traveller leaves.
        /// `{name}` is replaced with the traveller's name.
        leave_room: String,
        /// Message shown to the destination room as the traveller arrives.
        arrive_room: String,
    },
    /// A player account. The user's inventory is the set of entities whose
    /// location is this user; it is derived, never stored here.
    User {
        password_hash: String,
        last_login: Option<DateTime<Utc>>,
    },
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Object => "object",
            EntityKind::Room { .. } => "room",
            EntityKind::Exit { .. } => "exit",
            EntityKind::User { .. } => "user",
        }
    }
}

/// Every addressable thing in the world: a user, a room, an exit, or a
/// generic object. Shared fields live here; kind-specific state lives in
/// [`EntityKind`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    /// Short alphanumeric token, not unique on its own.
    pub name: String,
    /// `owner_name/name`, globally unique. Re-keyed whenever name or owner
    /// changes.
    pub fqn: String,
    /// Creating user. `None` only for system-created entities (the seed room).
    pub owner: Option<EntityId>,
    /// Free Markdown-flavored text, mutable by the owner.
    pub description: String,
    /// Attribute-name to string payload. An attribute name doubles as a verb:
    /// invoking it as a command emits the value as output.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Alternative names accepted by resolution. Aliases do not appear in
    /// the FQN and carry no uniqueness guarantee.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Containing entity. `None` for rooms and for users in limbo.
    pub location: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub kind: EntityKind,
}

impl Entity {
    pub fn is_room(&self) -> bool {
        matches!(self.kind, EntityKind::Room { .. })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, EntityKind::Exit { .. })
    }

    pub fn is_user(&self) -> bool {
        matches!(self.kind, EntityKind::User { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, EntityKind::Object)
    }

    /// True when `user` may mutate this entity.
    pub fn owned_by(&self, user: EntityId) -> bool {
        self.owner == Some(user)
    }

    /// True when `token` is this entity's name or one of its aliases.
    pub fn matches_name(&self, token: &str) -> bool {
        self.name == token || self.aliases.iter().any(|a| a == token)
    }
}

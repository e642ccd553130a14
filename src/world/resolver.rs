//! Name resolution.
//!
//! Maps a raw token from a command line to a single entity, given the actor
//! and a resolution scope. FQNs (`owner/name`) are unambiguous and always
//! win; bare names are matched case-sensitively within the requested scope,
//! falling back to the actor's own globally-owned names. When several
//! same-named entities match, the most recently created one wins - a
//! deliberate policy that keeps common interactions unblocked rather than
//! surfacing an ambiguity error.

use crate::world::errors::WorldError;
use crate::world::store::WorldStore;
use crate::world::types::{looks_like_fqn, Entity, EntityId};

/// The set of entities considered when resolving a bare name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Entities carried by the actor.
    Inventory,
    /// Entities in the actor's current room (including the actor's
    /// inventory, which is always at hand).
    CurrentRoom,
    /// Any entity anywhere, by exact FQN or by name.
    Global,
}

/// Everything resolution needs to know about who is asking.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub actor: EntityId,
    pub current_room: Option<EntityId>,
}

impl ResolutionContext {
    pub fn new(actor: EntityId, current_room: Option<EntityId>) -> Self {
        Self {
            actor,
            current_room,
        }
    }
}

/// Resolve `raw` to an entity, or fail with `NotFound`.
///
/// Order of attempts:
/// 1. `me` / `here` special tokens.
/// 2. Exact FQN match, regardless of requested scope.
/// 3. Exact case-sensitive name or alias match within the requested scope
///    (Global searches the whole namespace).
/// 4. For Inventory/CurrentRoom scopes, a global fallback restricted to
///    entities the actor owns.
pub fn resolve(
    ctx: &ResolutionContext,
    raw: &str,
    scope: Scope,
    store: &WorldStore,
) -> Result<Entity, WorldError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(WorldError::NotFound(String::new()));
    }

    if token == "me" {
        return store.get(ctx.actor);
    }
    if token == "here" {
        let room = ctx
            .current_room
            .ok_or_else(|| WorldError::NotFound("here".to_string()))?;
        return store.get(room);
    }

    if looks_like_fqn(token) {
        return store.get_by_fqn(token);
    }

    let mut candidates: Vec<Entity> = match scope {
        Scope::Inventory => named_in(store, ctx.actor, token),
        Scope::CurrentRoom => {
            let mut found = ctx
                .current_room
                .map(|room| named_in(store, room, token))
                .unwrap_or_default();
            found.extend(named_in(store, ctx.actor, token));
            found
        }
        Scope::Global => store.named_anywhere(token),
    };

    if candidates.is_empty() && scope != Scope::Global {
        candidates = store.owned_named(ctx.actor, token);
    }

    newest(candidates).ok_or_else(|| WorldError::NotFound(token.to_string()))
}

/// Entities directly inside `container` answering to this name or alias.
fn named_in(store: &WorldStore, container: EntityId, name: &str) -> Vec<Entity> {
    store
        .contents_of(container)
        .into_iter()
        .filter(|e| e.matches_name(name))
        .collect()
}

/// Tie-break: most recently created candidate wins.
fn newest(candidates: Vec<Entity>) -> Option<Entity> {
    candidates.into_iter().max_by_key(|e| e.created_at)
}

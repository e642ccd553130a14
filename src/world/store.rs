//! The object store: every entity in the world, keyed by id and by FQN.
//!
//! All world state lives in one [`WorldState`] behind a single `RwLock`.
//! Every mutating operation takes the write lock exactly once and applies
//! the whole change inside it, so concurrent readers never observe a
//! half-updated entity (an FQN re-keyed but the name not yet changed, a
//! move applied to one container but not the other). Reads clone the
//! entities they return and drop the lock immediately.

use std::collections::{BTreeMap, HashMap};

use argon2::Argon2;
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use uuid::Uuid;

use crate::world::errors::WorldError;
use crate::world::types::{is_valid_name, make_fqn, Entity, EntityId, EntityKind};

/// Owner segment used in FQNs of system-created entities.
pub const SYSTEM_NAMESPACE: &str = "world";

#[derive(Default)]
struct WorldState {
    entities: HashMap<EntityId, Entity>,
    /// FQN -> id. Globally unique at all times.
    fqns: HashMap<String, EntityId>,
    /// Username -> id, for login and `@user` targeting.
    users: HashMap<String, EntityId>,
    /// Location id -> contained ids. Derived from `Entity::location`,
    /// maintained alongside it.
    contents: HashMap<EntityId, Vec<EntityId>>,
}

/// Shared, lock-guarded world model.
pub struct WorldStore {
    inner: RwLock<WorldState>,
    argon2: Argon2<'static>,
}

impl Default for WorldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(WorldState::default()),
            argon2: Argon2::default(),
        }
    }

    /// Rebuild a store from a flat entity list (snapshot restore). The FQN,
    /// user, and containment indices are reconstructed from the entities
    /// themselves, mirroring how the snapshot document is defined. A list
    /// whose containment graph is inconsistent (a location pointing at a
    /// missing entity, or a containment cycle) is rejected outright; the
    /// store never starts from state it could not have produced.
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self, WorldError> {
        let mut state = WorldState::default();
        for entity in entities {
            if state.fqns.contains_key(&entity.fqn) {
                return Err(WorldError::NameConflict(entity.fqn));
            }
            state.fqns.insert(entity.fqn.clone(), entity.id);
            if entity.is_user() {
                state.users.insert(entity.name.clone(), entity.id);
            }
            if let Some(location) = entity.location {
                state.contents.entry(location).or_default().push(entity.id);
            }
            state.entities.insert(entity.id, entity);
        }
        for entity in state.entities.values() {
            if let Some(location) = entity.location {
                if !state.entities.contains_key(&location) {
                    return Err(WorldError::CorruptSnapshot(format!(
                        "{} is located in missing entity {}",
                        entity.fqn, location
                    )));
                }
            }
            // An acyclic chain can be at most entities.len() long; a longer
            // walk means some ancestor repeats.
            let mut cursor = entity.location;
            let mut steps = 0;
            while let Some(current) = cursor {
                if current == entity.id || steps > state.entities.len() {
                    return Err(WorldError::CorruptSnapshot(format!(
                        "containment cycle through {}",
                        entity.fqn
                    )));
                }
                cursor = state.entities.get(&current).and_then(|e| e.location);
                steps += 1;
            }
        }
        Ok(Self {
            inner: RwLock::new(state),
            argon2: Argon2::default(),
        })
    }

    /// Clone every entity under a read lock. This is the consistent view the
    /// snapshotter serializes; the write path is never blocked for longer
    /// than the clone itself.
    pub fn export_entities(&self) -> Vec<Entity> {
        let state = self.inner.read();
        state.entities.values().cloned().collect()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a user account. Users own themselves and start "nowhere";
    /// login places them in the default room.
    pub fn create_user(
        &self,
        username: &str,
        description: &str,
        password: &str,
    ) -> Result<Entity, WorldError> {
        if !is_valid_name(username) {
            return Err(WorldError::BadRequest(
                "usernames can only contain alphanumeric characters".into(),
            ));
        }
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| WorldError::PasswordHash(e.to_string()))?
            .to_string();

        let mut state = self.inner.write();
        if state.users.contains_key(username) {
            return Err(WorldError::NameConflict(username.to_string()));
        }
        let id = Uuid::new_v4();
        let entity = Entity {
            id,
            name: username.to_string(),
            fqn: make_fqn(username, username),
            owner: Some(id),
            description: description.to_string(),
            attributes: BTreeMap::new(),
            aliases: Vec::new(),
            location: None,
            created_at: Utc::now(),
            kind: EntityKind::User {
                password_hash: hash,
                last_login: None,
            },
        };
        state.insert_entity(entity.clone())?;
        state.users.insert(username.to_string(), id);
        debug!("created user {} ({})", entity.fqn, id);
        Ok(entity)
    }

    /// Create a generic object in the creator's inventory.
    pub fn create_object(
        &self,
        name: &str,
        description: &str,
        owner: EntityId,
    ) -> Result<Entity, WorldError> {
        self.create_entity(name, description, Some(owner), Some(owner), EntityKind::Object)
    }

    /// Create a room. Rooms are never contained; `owner` is `None` only for
    /// the system seed room.
    pub fn create_room(
        &self,
        name: &str,
        description: &str,
        owner: Option<EntityId>,
    ) -> Result<Entity, WorldError> {
        self.create_entity(name, description, owner, None, EntityKind::Room { exits: Vec::new() })
    }

    /// Create an exit inside `source_room` pointing at `destination_fqn`.
    /// The destination must currently resolve to a room; exits only go
    /// dangling later, if their destination is deleted out from under them.
    pub fn create_exit(
        &self,
        name: &str,
        description: &str,
        owner: EntityId,
        source_room: EntityId,
        destination_fqn: &str,
    ) -> Result<Entity, WorldError> {
        if !is_valid_name(name) {
            return Err(WorldError::BadRequest(
                "exit names can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        let source = state
            .entities
            .get(&source_room)
            .ok_or_else(|| WorldError::NotFound(format!("room {}", source_room)))?;
        if !source.is_room() {
            return Err(WorldError::BadRequest("exits can only start in a room".into()));
        }
        let source_name = source.name.clone();
        let destination_id = state
            .fqns
            .get(destination_fqn)
            .copied()
            .ok_or_else(|| WorldError::NotFound(destination_fqn.to_string()))?;
        let destination = &state.entities[&destination_id];
        if !destination.is_room() {
            return Err(WorldError::NotFound(format!("{} is not a room", destination_fqn)));
        }
        if destination_id == source_room {
            return Err(WorldError::BadRequest(
                "an exit cannot connect a room to itself".into(),
            ));
        }
        let destination_name = destination.name.clone();
        let owner_name = state.owner_name(Some(owner));

        let id = Uuid::new_v4();
        let entity = Entity {
            id,
            name: name.to_string(),
            fqn: make_fqn(&owner_name, name),
            owner: Some(owner),
            description: description.to_string(),
            attributes: BTreeMap::new(),
            aliases: Vec::new(),
            location: Some(source_room),
            created_at: Utc::now(),
            kind: EntityKind::Exit {
                destination_fqn: destination_fqn.to_string(),
                leave_user: format!("You leave \"{}\" via \"{}\".", source_name, name),
                leave_room: format!(
                    "{{name}} leaves for \"{}\" via \"{}\".",
                    destination_name, name
                ),
                arrive_room: format!("{{name}} arrives from \"{}\".", source_name),
            },
        };
        state.insert_entity(entity.clone())?;
        if let Some(room) = state.entities.get_mut(&source_room) {
            if let EntityKind::Room { exits } = &mut room.kind {
                exits.push(id);
            }
        }
        debug!("created exit {} -> {}", entity.fqn, destination_fqn);
        Ok(entity)
    }

    fn create_entity(
        &self,
        name: &str,
        description: &str,
        owner: Option<EntityId>,
        location: Option<EntityId>,
        kind: EntityKind,
    ) -> Result<Entity, WorldError> {
        if !is_valid_name(name) {
            return Err(WorldError::BadRequest(
                "names can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        if let Some(owner_id) = owner {
            if !state.entities.contains_key(&owner_id) {
                return Err(WorldError::NotFound(format!("owner {}", owner_id)));
            }
        }
        let owner_name = state.owner_name(owner);
        let entity = Entity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            fqn: make_fqn(&owner_name, name),
            owner,
            description: description.to_string(),
            attributes: BTreeMap::new(),
            aliases: Vec::new(),
            location,
            created_at: Utc::now(),
            kind,
        };
        state.insert_entity(entity.clone())?;
        debug!("created {} {}", entity.kind.label(), entity.fqn);
        Ok(entity)
    }

    /// Duplicate an object: same description and attributes, fresh id, FQN
    /// under the cloner's namespace, placed in the cloner's inventory.
    pub fn clone_entity(
        &self,
        actor: EntityId,
        source: EntityId,
        new_name: &str,
    ) -> Result<Entity, WorldError> {
        if !is_valid_name(new_name) {
            return Err(WorldError::BadRequest(
                "names can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        let template = state
            .entities
            .get(&source)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", source)))?;
        if !template.is_object() {
            return Err(WorldError::BadRequest("only objects can be cloned".into()));
        }
        let description = template.description.clone();
        let attributes = template.attributes.clone();
        let aliases = template.aliases.clone();
        let owner_name = state.owner_name(Some(actor));
        let entity = Entity {
            id: Uuid::new_v4(),
            name: new_name.to_string(),
            fqn: make_fqn(&owner_name, new_name),
            owner: Some(actor),
            description,
            attributes,
            aliases,
            location: Some(actor),
            created_at: Utc::now(),
            kind: EntityKind::Object,
        };
        state.insert_entity(entity.clone())?;
        Ok(entity)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get(&self, id: EntityId) -> Result<Entity, WorldError> {
        self.inner
            .read()
            .entities
            .get(&id)
            .cloned()
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", id)))
    }

    pub fn get_by_fqn(&self, fqn: &str) -> Result<Entity, WorldError> {
        let state = self.inner.read();
        state
            .fqns
            .get(fqn)
            .and_then(|id| state.entities.get(id))
            .cloned()
            .ok_or_else(|| WorldError::NotFound(fqn.to_string()))
    }

    pub fn find_user(&self, username: &str) -> Option<EntityId> {
        self.inner.read().users.get(username).copied()
    }

    /// Clones of everything located directly inside `id`.
    pub fn contents_of(&self, id: EntityId) -> Vec<Entity> {
        let state = self.inner.read();
        state
            .contents
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|cid| state.entities.get(cid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Users currently inside a room. Occupancy is always derived from
    /// containment, never cached separately.
    pub fn occupants(&self, room: EntityId) -> Vec<EntityId> {
        let state = self.inner.read();
        state
            .contents
            .get(&room)
            .map(|ids| {
                ids.iter()
                    .filter(|cid| state.entities.get(cid).map(Entity::is_user).unwrap_or(false))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The display name of an entity's owner (`world` for system entities).
    pub fn owner_name_of(&self, entity: &Entity) -> String {
        self.inner.read().owner_name(entity.owner)
    }

    /// All entities owned by `owner` whose name or alias matches exactly.
    pub fn owned_named(&self, owner: EntityId, name: &str) -> Vec<Entity> {
        let state = self.inner.read();
        state
            .entities
            .values()
            .filter(|e| e.owner == Some(owner) && e.matches_name(name))
            .cloned()
            .collect()
    }

    /// All entities anywhere whose name or alias matches exactly.
    pub fn named_anywhere(&self, name: &str) -> Vec<Entity> {
        let state = self.inner.read();
        state
            .entities
            .values()
            .filter(|e| e.matches_name(name))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Set an attribute on an entity owned by `actor`.
    pub fn set_attribute(
        &self,
        actor: EntityId,
        target: EntityId,
        key: &str,
        value: &str,
    ) -> Result<(), WorldError> {
        if !is_valid_name(key) {
            return Err(WorldError::BadRequest(
                "attribute names can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        entity.attributes.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove an attribute from an entity owned by `actor`.
    pub fn delete_attribute(
        &self,
        actor: EntityId,
        target: EntityId,
        key: &str,
    ) -> Result<(), WorldError> {
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        if entity.attributes.remove(key).is_none() {
            return Err(WorldError::NotFound(format!("attribute {}", key)));
        }
        Ok(())
    }

    /// Add an alternative name to an entity owned by `actor`. Adding an
    /// alias the entity already answers to is a no-op.
    pub fn add_alias(
        &self,
        actor: EntityId,
        target: EntityId,
        alias: &str,
    ) -> Result<(), WorldError> {
        if !is_valid_name(alias) {
            return Err(WorldError::BadRequest(
                "aliases can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        if !entity.matches_name(alias) {
            entity.aliases.push(alias.to_string());
        }
        Ok(())
    }

    /// Remove an alias from an entity owned by `actor`.
    pub fn remove_alias(
        &self,
        actor: EntityId,
        target: EntityId,
        alias: &str,
    ) -> Result<(), WorldError> {
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        let before = entity.aliases.len();
        entity.aliases.retain(|a| a != alias);
        if entity.aliases.len() == before {
            return Err(WorldError::NotFound(format!("alias {}", alias)));
        }
        Ok(())
    }

    /// Replace an entity's description (owner only).
    pub fn set_description(
        &self,
        actor: EntityId,
        target: EntityId,
        text: &str,
    ) -> Result<(), WorldError> {
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        entity.description = text.to_string();
        Ok(())
    }

    /// Rename an entity, re-keying the FQN index in the same critical
    /// section. Users keep their login name for life.
    pub fn rename(
        &self,
        actor: EntityId,
        target: EntityId,
        new_name: &str,
    ) -> Result<Entity, WorldError> {
        if !is_valid_name(new_name) {
            return Err(WorldError::BadRequest(
                "names can only contain alphanumeric characters".into(),
            ));
        }
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        if !entity.owned_by(actor) {
            return Err(WorldError::PermissionDenied(entity.fqn.clone()));
        }
        if entity.is_user() {
            return Err(WorldError::BadRequest("users cannot be renamed".into()));
        }
        let old_fqn = entity.fqn.clone();
        let owner_name = state.owner_name(entity.owner);
        let new_fqn = make_fqn(&owner_name, new_name);
        if new_fqn != old_fqn && state.fqns.contains_key(&new_fqn) {
            return Err(WorldError::NameConflict(new_fqn));
        }
        state.fqns.remove(&old_fqn);
        state.fqns.insert(new_fqn.clone(), target);
        let entity = state
            .entities
            .get_mut(&target)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
        entity.name = new_name.to_string();
        entity.fqn = new_fqn;
        Ok(entity.clone())
    }

    /// Relocate an entity into a new container. Rejects moving rooms or
    /// exits, containers that do not exist, and containment cycles.
    pub fn move_entity(
        &self,
        entity_id: EntityId,
        new_location: EntityId,
    ) -> Result<(), WorldError> {
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get(&entity_id)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", entity_id)))?;
        if entity.is_room() {
            return Err(WorldError::BadRequest("rooms cannot be contained".into()));
        }
        if entity.is_exit() {
            return Err(WorldError::BadRequest("exits cannot be moved".into()));
        }
        let container = state
            .entities
            .get(&new_location)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", new_location)))?;
        if container.is_exit() {
            return Err(WorldError::BadRequest("exits cannot contain things".into()));
        }
        // Walk up from the destination; if we reach the moved entity, the
        // move would put a container inside itself.
        let mut cursor = Some(new_location);
        while let Some(current) = cursor {
            if current == entity_id {
                let fqn = state.entities[&entity_id].fqn.clone();
                return Err(WorldError::CycleDetected(fqn));
            }
            cursor = state.entities.get(&current).and_then(|e| e.location);
        }
        state.relocate(entity_id, Some(new_location));
        Ok(())
    }

    /// Place a user with no location into a room. New accounts start
    /// nowhere; login drops them into the configured default room. Returns
    /// false when the user already had a location.
    pub fn place_if_nowhere(&self, user: EntityId, room: EntityId) -> Result<bool, WorldError> {
        let mut state = self.inner.write();
        let entity = state
            .entities
            .get(&user)
            .ok_or_else(|| WorldError::NotFound(format!("entity {}", user)))?;
        if entity.location.is_some() {
            return Ok(false);
        }
        if !state.entities.get(&room).map(Entity::is_room).unwrap_or(false) {
            return Err(WorldError::NotFound(format!("room {}", room)));
        }
        state.relocate(user, Some(room));
        Ok(true)
    }

    /// Delete an entity.
    ///
    /// Policy (documented in DESIGN.md): objects are deleted together with
    /// everything they contain; exits are unhooked from their source room;
    /// rooms fail with [`WorldError::NotEmpty`] while users occupy them,
    /// otherwise contained objects return to their owners' inventories and
    /// every exit pointing at the room is force-deleted so nothing dangles.
    /// Users cannot be deleted through this path at all.
    pub fn delete(&self, actor: EntityId, target: EntityId) -> Result<(), WorldError> {
        let mut state = self.inner.write();
        let (kind, fqn) = {
            let entity = state
                .entities
                .get(&target)
                .ok_or_else(|| WorldError::NotFound(format!("entity {}", target)))?;
            if !entity.owned_by(actor) {
                return Err(WorldError::PermissionDenied(entity.fqn.clone()));
            }
            (entity.kind.clone(), entity.fqn.clone())
        };
        match kind {
            EntityKind::User { .. } => {
                Err(WorldError::PermissionDenied("users cannot be deleted".into()))
            }
            EntityKind::Object => {
                state.remove_subtree(target);
                Ok(())
            }
            EntityKind::Exit { .. } => {
                state.remove_exit(target);
                Ok(())
            }
            EntityKind::Room { .. } => {
                let contained = state.contents.get(&target).cloned().unwrap_or_default();
                if contained
                    .iter()
                    .any(|id| state.entities.get(id).map(Entity::is_user).unwrap_or(false))
                {
                    return Err(WorldError::NotEmpty(fqn));
                }
                // Reparent loose objects to their owners' inventories so they
                // still exist somewhere in the world.
                for id in contained {
                    match state.entities.get(&id).map(|e| e.kind.clone()) {
                        Some(EntityKind::Exit { .. }) => state.remove_exit(id),
                        Some(_) => {
                            let owner = state.entities.get(&id).and_then(|e| e.owner);
                            match owner {
                                Some(owner_id) if owner_id != id => {
                                    state.relocate(id, Some(owner_id));
                                }
                                _ => state.remove_subtree(id),
                            }
                        }
                        None => {}
                    }
                }
                // No exits to nowhere: drop every exit that targets this room.
                let incoming: Vec<EntityId> = state
                    .entities
                    .values()
                    .filter(|e| {
                        matches!(&e.kind, EntityKind::Exit { destination_fqn, .. } if *destination_fqn == fqn)
                    })
                    .map(|e| e.id)
                    .collect();
                for exit_id in incoming {
                    state.remove_exit(exit_id);
                }
                state.remove_single(target);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Verify a username/password pair and stamp the login time. Unknown
    /// users and bad passwords fail identically.
    pub fn verify_login(&self, username: &str, password: &str) -> Result<EntityId, WorldError> {
        let stored = {
            let state = self.inner.read();
            let id = state.users.get(username).copied();
            id.and_then(|id| state.entities.get(&id).cloned())
        };
        let Some(user) = stored else {
            return Err(WorldError::LoginFailed);
        };
        let EntityKind::User { password_hash, .. } = &user.kind else {
            return Err(WorldError::LoginFailed);
        };
        let parsed =
            PasswordHash::new(password_hash).map_err(|e| WorldError::PasswordHash(e.to_string()))?;
        if self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(WorldError::LoginFailed);
        }
        let mut state = self.inner.write();
        if let Some(entity) = state.entities.get_mut(&user.id) {
            if let EntityKind::User { last_login, .. } = &mut entity.kind {
                *last_login = Some(Utc::now());
            }
        }
        Ok(user.id)
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Insert the system default room if the world is completely empty.
    /// Returns true when the room was created.
    pub fn seed_if_empty(&self, default_room_fqn: &str) -> Result<bool, WorldError> {
        {
            let state = self.inner.read();
            if !state.entities.is_empty() {
                return Ok(false);
            }
        }
        let name = default_room_fqn
            .rsplit('/')
            .next()
            .filter(|n| is_valid_name(n))
            .ok_or_else(|| WorldError::BadRequest(format!("bad room fqn: {}", default_room_fqn)))?
            .to_string();
        let mut state = self.inner.write();
        if !state.entities.is_empty() {
            return Ok(false);
        }
        let entity = Entity {
            id: Uuid::new_v4(),
            name: name.clone(),
            fqn: default_room_fqn.to_string(),
            owner: None,
            description: "A quiet, empty starting place. New arrivals appear here.".to_string(),
            attributes: BTreeMap::new(),
            aliases: Vec::new(),
            location: None,
            created_at: Utc::now(),
            kind: EntityKind::Room { exits: Vec::new() },
        };
        state.insert_entity(entity)?;
        Ok(true)
    }
}

impl WorldState {
    fn owner_name(&self, owner: Option<EntityId>) -> String {
        owner
            .and_then(|id| self.entities.get(&id))
            .map(|e| e.name.clone())
            .unwrap_or_else(|| SYSTEM_NAMESPACE.to_string())
    }

    fn insert_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        if self.fqns.contains_key(&entity.fqn) {
            return Err(WorldError::NameConflict(entity.fqn));
        }
        self.fqns.insert(entity.fqn.clone(), entity.id);
        if let Some(location) = entity.location {
            self.contents.entry(location).or_default().push(entity.id);
        }
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    /// Update an entity's location and both containment lists.
    fn relocate(&mut self, id: EntityId, new_location: Option<EntityId>) {
        let old = self.entities.get(&id).and_then(|e| e.location);
        if let Some(old_loc) = old {
            if let Some(list) = self.contents.get_mut(&old_loc) {
                list.retain(|c| *c != id);
            }
        }
        if let Some(new_loc) = new_location {
            self.contents.entry(new_loc).or_default().push(id);
        }
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.location = new_location;
        }
    }

    /// Remove one entity and its index entries. Contained entities are not
    /// touched; callers decide their fate first.
    fn remove_single(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.remove(&id) {
            self.fqns.remove(&entity.fqn);
            if entity.is_user() {
                self.users.remove(&entity.name);
            }
            if let Some(location) = entity.location {
                if let Some(list) = self.contents.get_mut(&location) {
                    list.retain(|c| *c != id);
                }
            }
            self.contents.remove(&id);
        }
    }

    /// Remove an entity together with everything transitively inside it.
    fn remove_subtree(&mut self, id: EntityId) {
        let children = self.contents.get(&id).cloned().unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
        self.remove_single(id);
    }

    /// Remove an exit and unhook it from its source room's exit list.
    fn remove_exit(&mut self, id: EntityId) {
        let source = self.entities.get(&id).and_then(|e| e.location);
        if let Some(room_id) = source {
            if let Some(room) = self.entities.get_mut(&room_id) {
                if let EntityKind::Room { exits } = &mut room.kind {
                    exits.retain(|e| *e != id);
                }
            }
        }
        self.remove_single(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_user() -> (WorldStore, Entity, Entity) {
        let store = WorldStore::new();
        store.seed_if_empty("world/limbo").expect("seed");
        let ann = store.create_user("Ann", "A keen builder.", "s3cret").expect("user");
        let room = store.get_by_fqn("world/limbo").expect("seed room");
        store.place_if_nowhere(ann.id, room.id).expect("place");
        (store, ann, room)
    }

    #[test]
    fn create_conflicting_fqn_fails_and_leaves_store_unchanged() {
        let (store, ann, _room) = world_with_user();
        store.create_object("trumpet", "Shiny.", ann.id).expect("first");
        let before = store.entity_count();
        let err = store.create_object("trumpet", "Another.", ann.id).unwrap_err();
        assert!(matches!(err, WorldError::NameConflict(_)));
        assert_eq!(store.entity_count(), before);
    }

    #[test]
    fn object_lands_in_creator_inventory() {
        let (store, ann, _room) = world_with_user();
        let obj = store.create_object("trumpet", "Shiny.", ann.id).expect("object");
        assert_eq!(obj.location, Some(ann.id));
        assert_eq!(obj.fqn, "Ann/trumpet");
        let inv = store.contents_of(ann.id);
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].id, obj.id);
    }

    #[test]
    fn move_into_own_contents_is_a_cycle() {
        let (store, ann, _room) = world_with_user();
        let chest = store.create_object("chest", "Roomy.", ann.id).expect("chest");
        let coin = store.create_object("coin", "Gold.", ann.id).expect("coin");
        store.move_entity(coin.id, chest.id).expect("coin into chest");
        let err = store.move_entity(chest.id, coin.id).unwrap_err();
        assert!(matches!(err, WorldError::CycleDetected(_)));
        // And after a legal move the old failure set no longer applies.
        store.move_entity(coin.id, ann.id).expect("coin back out");
        store.move_entity(chest.id, coin.id).expect("now legal");
    }

    #[test]
    fn attribute_mutation_is_owner_only() {
        let (store, ann, _room) = world_with_user();
        let bob = store.create_user("Bob", "", "hunter2").expect("bob");
        let obj = store.create_object("trumpet", "Shiny.", ann.id).expect("object");
        store.set_attribute(ann.id, obj.id, "play", "A jaunty tune.").expect("set");
        let err = store.set_attribute(bob.id, obj.id, "play", "Noise.").unwrap_err();
        assert!(matches!(err, WorldError::PermissionDenied(_)));
        let err = store.delete_attribute(ann.id, obj.id, "missing").unwrap_err();
        assert!(matches!(err, WorldError::NotFound(_)));
        store.delete_attribute(ann.id, obj.id, "play").expect("delete");
    }

    #[test]
    fn rename_rekeys_fqn_index() {
        let (store, ann, _room) = world_with_user();
        let obj = store.create_object("trumpet", "Shiny.", ann.id).expect("object");
        let renamed = store.rename(ann.id, obj.id, "tuba").expect("rename");
        assert_eq!(renamed.fqn, "Ann/tuba");
        assert!(store.get_by_fqn("Ann/trumpet").is_err());
        assert_eq!(store.get_by_fqn("Ann/tuba").expect("new key").id, obj.id);
    }

    #[test]
    fn rename_collision_fails() {
        let (store, ann, _room) = world_with_user();
        store.create_object("trumpet", "Shiny.", ann.id).expect("first");
        let tuba = store.create_object("tuba", "Big.", ann.id).expect("second");
        let err = store.rename(ann.id, tuba.id, "trumpet").unwrap_err();
        assert!(matches!(err, WorldError::NameConflict(_)));
        assert_eq!(store.get_by_fqn("Ann/tuba").expect("unchanged").id, tuba.id);
    }

    #[test]
    fn deleting_occupied_room_fails() {
        let (store, ann, _room) = world_with_user();
        let garden = store.create_room("Garden", "Green.", Some(ann.id)).expect("room");
        store.move_entity(ann.id, garden.id).expect("enter");
        let err = store.delete(ann.id, garden.id).unwrap_err();
        assert!(matches!(err, WorldError::NotEmpty(_)));
        assert!(store.get(garden.id).is_ok());
    }

    #[test]
    fn deleting_empty_room_returns_objects_and_drops_incoming_exits() {
        let (store, ann, room) = world_with_user();
        let garden = store.create_room("Garden", "Green.", Some(ann.id)).expect("room");
        let east = store
            .create_exit("east", "A gate.", ann.id, room.id, "Ann/Garden")
            .expect("exit");
        let ball = store.create_object("ball", "Bouncy.", ann.id).expect("ball");
        store.move_entity(ball.id, garden.id).expect("ball into garden");
        store.delete(ann.id, garden.id).expect("delete room");
        assert!(store.get(garden.id).is_err());
        // Ball went home to Ann's inventory; the exit to nowhere is gone.
        assert_eq!(store.get(ball.id).expect("ball survives").location, Some(ann.id));
        assert!(store.get(east.id).is_err());
        let room_after = store.get(room.id).expect("source room");
        if let EntityKind::Room { exits } = &room_after.kind {
            assert!(exits.is_empty());
        } else {
            panic!("not a room");
        }
    }

    #[test]
    fn deleting_object_removes_contents_too() {
        let (store, ann, _room) = world_with_user();
        let chest = store.create_object("chest", "Roomy.", ann.id).expect("chest");
        let coin = store.create_object("coin", "Gold.", ann.id).expect("coin");
        store.move_entity(coin.id, chest.id).expect("nest");
        store.delete(ann.id, chest.id).expect("delete");
        assert!(store.get(chest.id).is_err());
        assert!(store.get(coin.id).is_err());
        assert!(store.get_by_fqn("Ann/coin").is_err());
    }

    #[test]
    fn alias_mutation_is_owner_only() {
        let (store, ann, _room) = world_with_user();
        let bob = store.create_user("Bob", "", "hunter2").expect("bob");
        let obj = store.create_object("trumpet", "Shiny.", ann.id).expect("object");
        let err = store.add_alias(bob.id, obj.id, "horn").unwrap_err();
        assert!(matches!(err, WorldError::PermissionDenied(_)));
        store.add_alias(ann.id, obj.id, "horn").expect("alias");
        // Adding a name the entity already answers to changes nothing.
        store.add_alias(ann.id, obj.id, "horn").expect("idempotent");
        store.add_alias(ann.id, obj.id, "trumpet").expect("own name");
        assert_eq!(store.get(obj.id).expect("obj").aliases, vec!["horn"]);
        let err = store.remove_alias(ann.id, obj.id, "flute").unwrap_err();
        assert!(matches!(err, WorldError::NotFound(_)));
        store.remove_alias(ann.id, obj.id, "horn").expect("unalias");
    }

    #[test]
    fn restore_rejects_dangling_location() {
        let (store, ann, _room) = world_with_user();
        let obj = store.create_object("ball", "Bouncy.", ann.id).expect("ball");
        let mut entities = store.export_entities();
        for entity in &mut entities {
            if entity.id == obj.id {
                entity.location = Some(Uuid::new_v4());
            }
        }
        assert!(matches!(
            WorldStore::from_entities(entities),
            Err(WorldError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn restore_rejects_containment_cycle() {
        let (store, ann, _room) = world_with_user();
        let chest = store.create_object("chest", "Roomy.", ann.id).expect("chest");
        let coin = store.create_object("coin", "Gold.", ann.id).expect("coin");
        store.move_entity(coin.id, chest.id).expect("nest");
        let mut entities = store.export_entities();
        for entity in &mut entities {
            if entity.id == chest.id {
                entity.location = Some(coin.id);
            }
        }
        assert!(matches!(
            WorldStore::from_entities(entities),
            Err(WorldError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn login_round_trip() {
        let (store, ann, _room) = world_with_user();
        let id = store.verify_login("Ann", "s3cret").expect("login");
        assert_eq!(id, ann.id);
        assert!(matches!(store.verify_login("Ann", "wrong"), Err(WorldError::LoginFailed)));
        assert!(matches!(store.verify_login("Zed", "s3cret"), Err(WorldError::LoginFailed)));
    }

    #[test]
    fn exit_to_missing_destination_is_rejected_at_connect_time() {
        let (store, ann, room) = world_with_user();
        let err = store
            .create_exit("east", "A gate.", ann.id, room.id, "Ann/Nowhere")
            .unwrap_err();
        assert!(matches!(err, WorldError::NotFound(_)));
    }
}

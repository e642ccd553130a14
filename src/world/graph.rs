//! The room/exit subgraph: movement through exits, teleportation, and the
//! `connect` operation that wires rooms together.
//!
//! Exits are ordinary entities placed inside their source room, so they can
//! be looked at and described like anything else. They are one-directional
//! by construction; a round trip needs two `connect`s.

use crate::world::errors::WorldError;
use crate::world::store::WorldStore;
use crate::world::types::{Entity, EntityId, EntityKind};

/// Result of a successful relocation, carrying the pre-rendered messages
/// for the traveller and for both rooms.
#[derive(Debug)]
pub struct MoveOutcome {
    pub traveller: Entity,
    pub from_room: EntityId,
    pub to_room: EntityId,
    pub to_traveller: String,
    pub to_old_room: String,
    pub to_new_room: String,
}

/// Create an exit in `source_room` leading to the room named by
/// `destination_fqn`. Fails with `NotFound` when the destination does not
/// resolve to a room.
pub fn connect(
    store: &WorldStore,
    actor: EntityId,
    source_room: EntityId,
    exit_name: &str,
    destination_fqn: &str,
    description: &str,
) -> Result<Entity, WorldError> {
    store.create_exit(exit_name, description, actor, source_room, destination_fqn)
}

/// Walk a user through an exit in their current room. The destination FQN
/// is resolved on every use; a destination deleted since the exit was built
/// surfaces as `BrokenExit`.
pub fn move_through_exit(
    store: &WorldStore,
    actor: EntityId,
    exit: &Entity,
) -> Result<MoveOutcome, WorldError> {
    let EntityKind::Exit {
        destination_fqn,
        leave_user,
        leave_room,
        arrive_room,
    } = &exit.kind
    else {
        return Err(WorldError::BadRequest(format!("{} is not an exit", exit.name)));
    };
    let from_room = exit
        .location
        .ok_or_else(|| WorldError::BrokenExit(exit.name.clone()))?;
    let destination = store
        .get_by_fqn(destination_fqn)
        .map_err(|_| WorldError::BrokenExit(exit.name.clone()))?;
    if !destination.is_room() {
        return Err(WorldError::BrokenExit(exit.name.clone()));
    }
    store.move_entity(actor, destination.id)?;
    let traveller = store.get(actor)?;
    Ok(MoveOutcome {
        to_traveller: leave_user.clone(),
        to_old_room: leave_room.replace("{name}", &traveller.name),
        to_new_room: arrive_room.replace("{name}", &traveller.name),
        from_room,
        to_room: destination.id,
        traveller,
    })
}

/// Direct relocation to a room named by FQN; no exit needs to exist.
pub fn teleport(
    store: &WorldStore,
    actor: EntityId,
    destination_fqn: &str,
) -> Result<MoveOutcome, WorldError> {
    let destination = store.get_by_fqn(destination_fqn)?;
    if !destination.is_room() {
        return Err(WorldError::NotFound(format!("{} is not a room", destination_fqn)));
    }
    let traveller = store.get(actor)?;
    let from_room = traveller
        .location
        .ok_or_else(|| WorldError::BadRequest("you are nowhere".into()))?;
    if from_room == destination.id {
        return Err(WorldError::BadRequest("you are already there".into()));
    }
    store.move_entity(actor, destination.id)?;
    let traveller = store.get(actor)?;
    Ok(MoveOutcome {
        to_traveller: "You teleport away.".to_string(),
        to_old_room: format!("{} teleports away.", traveller.name),
        to_new_room: format!("{} teleports in.", traveller.name),
        from_room,
        to_room: destination.id,
        traveller,
    })
}

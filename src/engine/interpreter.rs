//! The command interpreter.
//!
//! A state-machine-free, single-pass classifier over one input line at a
//! time: sigil shortcuts (`"` say, `!` shout, `:` emote, `@` directed say),
//! exit-name movement, the built-in command table, and finally
//! attribute-as-verb dispatch. Handlers mutate the store through its public
//! operations and return `(recipient, message)` pairs; they never write to
//! a transport themselves, and every [`WorldError`] is recovered here and
//! rendered to the acting session only.

use log::debug;

use crate::world::errors::WorldError;
use crate::world::graph::{self, MoveOutcome};
use crate::world::resolver::{resolve, ResolutionContext, Scope};
use crate::world::store::WorldStore;
use crate::world::types::{looks_like_fqn, Entity, EntityId, EntityKind};

/// Who a generated message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The acting session only.
    Actor,
    /// Everyone currently in a room, minus the listed users.
    Room {
        room: EntityId,
        exclude: Vec<EntityId>,
    },
    /// One specific user.
    User(EntityId),
}

/// One message for the broadcast layer to fan out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub to: Recipient,
    pub body: String,
}

impl Outgoing {
    fn actor(body: impl Into<String>) -> Self {
        Self {
            to: Recipient::Actor,
            body: body.into(),
        }
    }

    fn room(room: EntityId, exclude: Vec<EntityId>, body: impl Into<String>) -> Self {
        Self {
            to: Recipient::Room { room, exclude },
            body: body.into(),
        }
    }

    fn user(user: EntityId, body: impl Into<String>) -> Self {
        Self {
            to: Recipient::User(user),
            body: body.into(),
        }
    }
}

/// A classified input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Shout(String),
    Emote(String),
    DirectedSay { target: String, text: String },
    Login { username: String, password: String },
    Look(Option<String>),
    Examine(String),
    Take(String),
    Drop(String),
    Inventory,
    Describe { target: String, text: String },
    Create { name: String, description: String },
    Build { name: String, description: String },
    Connect { room_fqn: String, exit_name: String, description: String },
    Set { fqn: String, attr: String, value: String },
    Delete { fqn: String, attr: Option<String> },
    Clone { fqn: String, new_name: String },
    Teleport { fqn: String },
    Rename { fqn: String, new_name: String },
    Give { target: String, to: String },
    Alias { fqn: String, alias: String },
    Unalias { fqn: String, alias: String },
    /// Anything else: an exit name, an attribute verb, or nonsense.
    Verb { verb: String, args: String },
    Empty,
}

/// Split off the first whitespace-delimited token.
fn split_token(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(idx) => (&input[..idx], input[idx..].trim_start()),
        None => (input, ""),
    }
}

/// Classify one raw line. Grammar errors surface later, in the handlers,
/// so classification itself never fails.
pub fn classify(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    if let Some(rest) = line.strip_prefix('"') {
        return Command::Say(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix('!') {
        return Command::Shout(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix(':') {
        return Command::Emote(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix('@') {
        let (target, text) = split_token(rest);
        return Command::DirectedSay {
            target: target.to_string(),
            text: text.to_string(),
        };
    }

    let (verb, args) = split_token(line);
    match verb {
        "login" => {
            let (username, password) = split_token(args);
            Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            }
        }
        "look" => Command::Look(if args.is_empty() {
            None
        } else {
            Some(args.to_string())
        }),
        "examine" => Command::Examine(args.to_string()),
        "take" => Command::Take(args.to_string()),
        "drop" => Command::Drop(args.to_string()),
        "inventory" => Command::Inventory,
        "describe" => {
            let (target, text) = split_token(args);
            Command::Describe {
                target: target.to_string(),
                text: text.to_string(),
            }
        }
        "create" => {
            let (name, description) = split_token(args);
            Command::Create {
                name: name.to_string(),
                description: description.to_string(),
            }
        }
        "build" => {
            let (name, description) = split_token(args);
            Command::Build {
                name: name.to_string(),
                description: description.to_string(),
            }
        }
        "connect" => {
            let (room_fqn, rest) = split_token(args);
            let (exit_name, description) = split_token(rest);
            Command::Connect {
                room_fqn: room_fqn.to_string(),
                exit_name: exit_name.to_string(),
                description: description.to_string(),
            }
        }
        "set" => {
            let (fqn, rest) = split_token(args);
            let (attr, value) = split_token(rest);
            Command::Set {
                fqn: fqn.to_string(),
                attr: attr.to_string(),
                value: value.to_string(),
            }
        }
        "delete" => {
            let (fqn, attr) = split_token(args);
            Command::Delete {
                fqn: fqn.to_string(),
                attr: if attr.is_empty() {
                    None
                } else {
                    Some(attr.to_string())
                },
            }
        }
        "clone" => {
            let (fqn, new_name) = split_token(args);
            Command::Clone {
                fqn: fqn.to_string(),
                new_name: new_name.to_string(),
            }
        }
        "rename" => {
            let (fqn, new_name) = split_token(args);
            Command::Rename {
                fqn: fqn.to_string(),
                new_name: new_name.to_string(),
            }
        }
        "give" => {
            let (target, to) = split_token(args);
            Command::Give {
                target: target.to_string(),
                to: to.to_string(),
            }
        }
        "alias" => {
            let (fqn, alias) = split_token(args);
            Command::Alias {
                fqn: fqn.to_string(),
                alias: alias.to_string(),
            }
        }
        "unalias" => {
            let (fqn, alias) = split_token(args);
            Command::Unalias {
                fqn: fqn.to_string(),
                alias: alias.to_string(),
            }
        }
        "teleport" => Command::Teleport {
            fqn: args.to_string(),
        },
        _ => Command::Verb {
            verb: verb.to_string(),
            args: args.to_string(),
        },
    }
}

/// Handle one line for an authenticated user. Errors are rendered into a
/// message for the actor; this function never fails.
pub fn handle_line(store: &WorldStore, actor: EntityId, line: &str) -> Vec<Outgoing> {
    let command = classify(line);
    if command == Command::Empty {
        return Vec::new();
    }
    debug!("dispatching {:?} for {}", command, actor);
    match dispatch(store, actor, command) {
        Ok(messages) => messages,
        Err(err) => vec![Outgoing::actor(render_error(&err))],
    }
}

fn dispatch(
    store: &WorldStore,
    actor: EntityId,
    command: Command,
) -> Result<Vec<Outgoing>, WorldError> {
    let actor_entity = store.get(actor)?;
    let ctx = ResolutionContext::new(actor, actor_entity.location);
    match command {
        Command::Empty => Ok(Vec::new()),
        Command::Say(text) => speech(&actor_entity, "say", &text),
        Command::Shout(text) => speech(&actor_entity, "shout", &text),
        Command::Emote(text) => {
            let room = require_room(&actor_entity)?;
            Ok(vec![Outgoing::room(
                room,
                Vec::new(),
                format!("{} {}", actor_entity.name, text),
            )])
        }
        Command::DirectedSay { target, text } => directed_say(store, &actor_entity, &target, &text),
        Command::Login { .. } => Ok(vec![Outgoing::actor("You are already logged in.")]),
        Command::Look(target) => look(store, &ctx, &actor_entity, target.as_deref()),
        Command::Examine(target) => examine(store, &ctx, &target),
        Command::Take(target) => take(store, &ctx, &actor_entity, &target),
        Command::Drop(target) => drop_object(store, &ctx, &actor_entity, &target),
        Command::Inventory => inventory(store, actor),
        Command::Describe { target, text } => {
            if target.is_empty() || text.is_empty() {
                return usage("describe <target> <text>");
            }
            let entity = resolve(&ctx, &target, Scope::CurrentRoom, store)?;
            store.set_description(actor, entity.id, &text)?;
            Ok(vec![Outgoing::actor(format!("Description of \"{}\" set.", entity.name))])
        }
        Command::Create { name, description } => {
            if name.is_empty() || description.is_empty() {
                return usage("create <name> <description>");
            }
            let object = store.create_object(&name, &description, actor)?;
            Ok(vec![Outgoing::actor(format!(
                "You create \"{}\". It's in your inventory.",
                object.fqn
            ))])
        }
        Command::Build { name, description } => {
            if name.is_empty() || description.is_empty() {
                return usage("build <name> <description>");
            }
            let room = store.create_room(&name, &description, Some(actor))?;
            Ok(vec![Outgoing::actor(format!(
                "You build \"{}\". Use connect or teleport to reach it.",
                room.fqn
            ))])
        }
        Command::Connect {
            room_fqn,
            exit_name,
            description,
        } => {
            if room_fqn.is_empty() || exit_name.is_empty() {
                return usage("connect <room/fqn> <exitname> <description>");
            }
            let here = require_room(&actor_entity)?;
            let exit = graph::connect(store, actor, here, &exit_name, &room_fqn, &description)?;
            Ok(vec![Outgoing::actor(format!(
                "You connect \"{}\" leading to \"{}\".",
                exit.name, room_fqn
            ))])
        }
        Command::Set { fqn, attr, value } => {
            if !looks_like_fqn(&fqn) || attr.is_empty() || value.is_empty() {
                return usage("set <object/fqn> <attribute> <text>");
            }
            let entity = store.get_by_fqn(&fqn)?;
            store.set_attribute(actor, entity.id, &attr, &value)?;
            Ok(vec![Outgoing::actor(format!(
                "Attribute \"{}\" set on \"{}\".",
                attr, entity.fqn
            ))])
        }
        Command::Delete { fqn, attr } => {
            if !looks_like_fqn(&fqn) {
                return usage("delete <object/fqn> [attribute]");
            }
            let entity = store.get_by_fqn(&fqn)?;
            match attr {
                Some(key) => {
                    store.delete_attribute(actor, entity.id, &key)?;
                    Ok(vec![Outgoing::actor(format!(
                        "Attribute \"{}\" removed from \"{}\".",
                        key, entity.fqn
                    ))])
                }
                None => {
                    store.delete(actor, entity.id)?;
                    Ok(vec![Outgoing::actor(format!("\"{}\" is gone.", entity.fqn))])
                }
            }
        }
        Command::Clone { fqn, new_name } => {
            if !looks_like_fqn(&fqn) || new_name.is_empty() {
                return usage("clone <object/fqn> <newname>");
            }
            let source = store.get_by_fqn(&fqn)?;
            let copy = store.clone_entity(actor, source.id, &new_name)?;
            Ok(vec![Outgoing::actor(format!(
                "You clone \"{}\" into \"{}\".",
                source.fqn, copy.fqn
            ))])
        }
        Command::Rename { fqn, new_name } => {
            if !looks_like_fqn(&fqn) || new_name.is_empty() {
                return usage("rename <object/fqn> <newname>");
            }
            let entity = store.get_by_fqn(&fqn)?;
            let renamed = store.rename(actor, entity.id, &new_name)?;
            Ok(vec![Outgoing::actor(format!(
                "\"{}\" is now \"{}\".",
                fqn, renamed.fqn
            ))])
        }
        Command::Give { target, to } => give(store, &ctx, &actor_entity, &target, &to),
        Command::Alias { fqn, alias } => {
            if !looks_like_fqn(&fqn) || alias.is_empty() {
                return usage("alias <object/fqn> <name>");
            }
            let entity = store.get_by_fqn(&fqn)?;
            store.add_alias(actor, entity.id, &alias)?;
            Ok(vec![Outgoing::actor(format!(
                "\"{}\" now also answers to \"{}\".",
                entity.fqn, alias
            ))])
        }
        Command::Unalias { fqn, alias } => {
            if !looks_like_fqn(&fqn) || alias.is_empty() {
                return usage("unalias <object/fqn> <name>");
            }
            let entity = store.get_by_fqn(&fqn)?;
            store.remove_alias(actor, entity.id, &alias)?;
            Ok(vec![Outgoing::actor(format!(
                "\"{}\" no longer answers to \"{}\".",
                entity.fqn, alias
            ))])
        }
        Command::Teleport { fqn } => {
            if fqn.is_empty() {
                return usage("teleport <room/fqn>");
            }
            let outcome = graph::teleport(store, actor, &fqn)?;
            Ok(movement_messages(actor, outcome))
        }
        Command::Verb { verb, args } => verb_dispatch(store, &ctx, &actor_entity, &verb, &args),
    }
}

/// Say and shout share a shape; only the verb differs.
fn speech(actor: &Entity, verb: &str, text: &str) -> Result<Vec<Outgoing>, WorldError> {
    let room = require_room(actor)?;
    if text.is_empty() {
        return Ok(vec![Outgoing::actor("You open your mouth, then think better of it.")]);
    }
    Ok(vec![
        Outgoing::actor(format!("You {}, \"{}\"", verb, text)),
        Outgoing::room(
            room,
            vec![actor.id],
            format!("{} {}s, \"{}\"", actor.name, verb, text),
        ),
    ])
}

/// `@user text`: speech aimed at one user but overheard by the whole room.
fn directed_say(
    store: &WorldStore,
    actor: &Entity,
    target: &str,
    text: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    let room = require_room(actor)?;
    let target_id = store
        .find_user(target)
        .ok_or_else(|| WorldError::NotFound(target.to_string()))?;
    let target_entity = store.get(target_id)?;
    Ok(vec![
        Outgoing::actor(format!("You say to {}, \"{}\"", target_entity.name, text)),
        Outgoing::user(
            target_id,
            format!("{} says to you, \"{}\"", actor.name, text),
        ),
        Outgoing::room(
            room,
            vec![actor.id, target_id],
            format!("{} says to {}, \"{}\"", actor.name, target_entity.name, text),
        ),
    ])
}

fn look(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    target: Option<&str>,
) -> Result<Vec<Outgoing>, WorldError> {
    let entity = match target {
        None => {
            let room = require_room(actor)?;
            store.get(room)?
        }
        Some(token) => resolve(ctx, token, Scope::CurrentRoom, store)?,
    };
    Ok(vec![Outgoing::actor(render_look(store, actor, &entity))])
}

/// Player-facing Markdown view of an entity.
fn render_look(store: &WorldStore, viewer: &Entity, entity: &Entity) -> String {
    let mut out = format!("## {}\n\n[**{}**]\n\n{}\n", entity.name, entity.fqn, entity.description);
    match &entity.kind {
        EntityKind::Room { exits } => {
            let contents: Vec<String> = store
                .contents_of(entity.id)
                .into_iter()
                .filter(|e| !e.is_exit() && e.id != viewer.id)
                .map(|e| e.name)
                .collect();
            if !contents.is_empty() {
                out.push_str(&format!("\n**You can see**: {}\n", contents.join(", ")));
            }
            let exit_names: Vec<String> = exits
                .iter()
                .filter_map(|id| store.get(*id).ok())
                .map(|e| e.name)
                .collect();
            if !exit_names.is_empty() {
                out.push_str(&format!("\n**Exits**: {}\n", exit_names.join(", ")));
            }
        }
        EntityKind::Exit {
            destination_fqn, ..
        } => {
            let destination = store
                .get_by_fqn(destination_fqn)
                .map(|d| d.name)
                .unwrap_or_else(|_| "nowhere (broken)".to_string());
            out.push_str(&format!("\nThis leads to \"{}\".\n", destination));
        }
        EntityKind::User { .. } => {
            let carried: Vec<String> = store
                .contents_of(entity.id)
                .into_iter()
                .map(|e| e.name)
                .collect();
            if !carried.is_empty() {
                out.push_str(&format!("\nThey are carrying: {}\n", carried.join(", ")));
            }
        }
        EntityKind::Object => {}
    }
    out
}

/// The metadata view: everything the game system knows about an entity.
fn examine(
    store: &WorldStore,
    ctx: &ResolutionContext,
    target: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    if target.is_empty() {
        return usage("examine <target>");
    }
    let entity = resolve(ctx, target, Scope::CurrentRoom, store)?;
    let location = entity
        .location
        .and_then(|id| store.get(id).ok())
        .map(|e| e.fqn)
        .unwrap_or_else(|| "nowhere".to_string());
    let mut out = format!(
        "### {}\n\n- id: {}\n- kind: {}\n- owner: {}\n- fqn: {}\n- location: {}\n- created: {}\n",
        entity.name,
        entity.id,
        entity.kind.label(),
        store.owner_name_of(&entity),
        entity.fqn,
        location,
        entity.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    if entity.attributes.is_empty() {
        out.push_str("- attributes: none\n");
    } else {
        out.push_str("- attributes:\n");
        for (key, value) in &entity.attributes {
            out.push_str(&format!("    - {}: {}\n", key, value));
        }
    }
    Ok(vec![Outgoing::actor(out)])
}

fn take(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    target: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    if target.is_empty() {
        return usage("take <target>");
    }
    let room = require_room(actor)?;
    let entity = resolve(ctx, target, Scope::CurrentRoom, store)?;
    if !entity.is_object() || entity.location != Some(room) {
        return Err(WorldError::BadRequest(format!("you can't take \"{}\"", target)));
    }
    store.move_entity(entity.id, actor.id)?;
    Ok(vec![
        Outgoing::actor(format!("You take the {}.", entity.name)),
        Outgoing::room(
            room,
            vec![actor.id],
            format!("{} takes the {}.", actor.name, entity.name),
        ),
    ])
}

fn drop_object(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    target: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    if target.is_empty() {
        return usage("drop <target>");
    }
    let room = require_room(actor)?;
    let entity = resolve(ctx, target, Scope::Inventory, store)?;
    if entity.location != Some(actor.id) {
        return Err(WorldError::BadRequest(format!(
            "you aren't carrying \"{}\"",
            target
        )));
    }
    store.move_entity(entity.id, room)?;
    Ok(vec![
        Outgoing::actor(format!("You drop the {}.", entity.name)),
        Outgoing::room(
            room,
            vec![actor.id],
            format!("{} drops the {}.", actor.name, entity.name),
        ),
    ])
}

/// Hand a carried object to another user in the same room.
fn give(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    target: &str,
    to: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    if target.is_empty() || to.is_empty() {
        return usage("give <object> <username>");
    }
    let room = require_room(actor)?;
    let object = resolve(ctx, target, Scope::Inventory, store)?;
    if object.location != Some(actor.id) {
        return Err(WorldError::BadRequest(format!(
            "you aren't carrying \"{}\"",
            target
        )));
    }
    let recipient_id = store
        .find_user(to)
        .ok_or_else(|| WorldError::NotFound(to.to_string()))?;
    if recipient_id == actor.id {
        return Err(WorldError::BadRequest("you already have it".into()));
    }
    let recipient = store.get(recipient_id)?;
    if recipient.location != Some(room) {
        return Err(WorldError::BadRequest(format!("{} isn't here", recipient.name)));
    }
    store.move_entity(object.id, recipient_id)?;
    Ok(vec![
        Outgoing::actor(format!("You give the {} to {}.", object.name, recipient.name)),
        Outgoing::user(
            recipient_id,
            format!("{} gives you the {}.", actor.name, object.name),
        ),
        Outgoing::room(
            room,
            vec![actor.id, recipient_id],
            format!("{} gives the {} to {}.", actor.name, object.name, recipient.name),
        ),
    ])
}

fn inventory(store: &WorldStore, actor: EntityId) -> Result<Vec<Outgoing>, WorldError> {
    let carried: Vec<String> = store
        .contents_of(actor)
        .into_iter()
        .map(|e| e.name)
        .collect();
    let body = if carried.is_empty() {
        "You aren't carrying anything.".to_string()
    } else {
        format!("You are carrying: {}.", carried.join(", "))
    };
    Ok(vec![Outgoing::actor(body)])
}

/// Unmatched verbs: first an exit in the current room, then an attribute of
/// that name on the actor, on objects in the room, and on objects carried
/// (in that priority order).
fn verb_dispatch(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    verb: &str,
    args: &str,
) -> Result<Vec<Outgoing>, WorldError> {
    if let Some(room) = actor.location {
        let exit = store
            .contents_of(room)
            .into_iter()
            .find(|e| e.is_exit() && e.name == verb);
        if let Some(exit) = exit {
            let outcome = graph::move_through_exit(store, actor.id, &exit)?;
            return Ok(movement_messages(actor.id, outcome));
        }
    }

    if let Some(value) = find_attribute_verb(store, ctx, actor, verb, args) {
        let rendered = evaluate(&value, ctx);
        return Ok(vec![Outgoing::actor(rendered)]);
    }

    Err(WorldError::UnknownCommand(verb.to_string()))
}

/// Ordered search for an attribute whose name matches the verb. A resolvable
/// argument is checked first so `play trumpet` prefers the trumpet even when
/// something else in scope also knows how to `play`.
fn find_attribute_verb(
    store: &WorldStore,
    ctx: &ResolutionContext,
    actor: &Entity,
    verb: &str,
    args: &str,
) -> Option<String> {
    if !args.is_empty() {
        let (token, _) = split_token(args);
        if let Ok(entity) = resolve(ctx, token, Scope::CurrentRoom, store) {
            if let Some(value) = entity.attributes.get(verb) {
                return Some(value.clone());
            }
        }
    }
    if let Some(value) = actor.attributes.get(verb) {
        return Some(value.clone());
    }
    if let Some(room) = actor.location {
        for entity in store.contents_of(room) {
            if let Some(value) = entity.attributes.get(verb) {
                return Some(value.clone());
            }
        }
    }
    for entity in store.contents_of(actor.id) {
        if let Some(value) = entity.attributes.get(verb) {
            return Some(value.clone());
        }
    }
    None
}

/// Extension point reserved for the scripting evaluator. Today an attribute
/// value is emitted verbatim.
fn evaluate(attribute_value: &str, _ctx: &ResolutionContext) -> String {
    attribute_value.to_string()
}

fn movement_messages(actor: EntityId, outcome: MoveOutcome) -> Vec<Outgoing> {
    vec![
        Outgoing::actor(outcome.to_traveller),
        Outgoing::room(outcome.from_room, vec![actor], outcome.to_old_room),
        Outgoing::room(outcome.to_room, vec![actor], outcome.to_new_room),
    ]
}

fn require_room(actor: &Entity) -> Result<EntityId, WorldError> {
    actor
        .location
        .ok_or_else(|| WorldError::BadRequest("you are nowhere; log in again".into()))
}

fn usage(text: &str) -> Result<Vec<Outgoing>, WorldError> {
    Err(WorldError::BadRequest(format!("usage: {}", text)))
}

/// Turn a recovered error into the message shown to the acting session.
pub fn render_error(err: &WorldError) -> String {
    match err {
        WorldError::NotFound(what) if what.is_empty() => "There's nothing like that here.".into(),
        WorldError::NotFound(what) => format!("There's no \"{}\" here.", what),
        WorldError::NameConflict(fqn) => format!("The name \"{}\" is already taken.", fqn),
        WorldError::CycleDetected(_) => "You can't put something inside itself.".into(),
        WorldError::NotEmpty(fqn) => format!("\"{}\" still has people in it.", fqn),
        WorldError::PermissionDenied(_) => "You can't do that; it isn't yours.".into(),
        WorldError::UnknownCommand(verb) => format!("I don't know how to \"{}\".", verb),
        WorldError::BrokenExit(name) => {
            format!("The exit \"{}\" leads nowhere; its destination is gone.", name)
        }
        WorldError::BadRequest(msg) => {
            let mut chars = msg.chars();
            match chars.next() {
                Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
                None => "That doesn't make sense.".into(),
            }
        }
        WorldError::LoginFailed => "Login failed.".into(),
        WorldError::Io(_)
        | WorldError::Json(_)
        | WorldError::CorruptSnapshot(_)
        | WorldError::PasswordHash(_) => "Something went wrong; try again.".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> (WorldStore, Entity, Entity) {
        let store = WorldStore::new();
        store.seed_if_empty("world/Welcome").expect("seed");
        let ann = store.create_user("Ann", "A keen builder.", "pw").expect("ann");
        let room = store.get_by_fqn("world/Welcome").expect("room");
        store.place_if_nowhere(ann.id, room.id).expect("place");
        (store, ann, room)
    }

    fn actor_bodies(messages: &[Outgoing]) -> Vec<&str> {
        messages
            .iter()
            .filter(|m| m.to == Recipient::Actor)
            .map(|m| m.body.as_str())
            .collect()
    }

    #[test]
    fn classify_sigils() {
        assert_eq!(classify("\"hello"), Command::Say("hello".into()));
        assert_eq!(classify("!hooray"), Command::Shout("hooray".into()));
        assert_eq!(classify(":grins"), Command::Emote("grins".into()));
        assert_eq!(
            classify("@Bob nice trumpet"),
            Command::DirectedSay {
                target: "Bob".into(),
                text: "nice trumpet".into()
            }
        );
    }

    #[test]
    fn classify_builtins_and_fallthrough() {
        assert_eq!(classify("look"), Command::Look(None));
        assert_eq!(classify("look ball"), Command::Look(Some("ball".into())));
        assert_eq!(classify("inventory"), Command::Inventory);
        assert_eq!(
            classify("set Ann/trumpet play You play a jaunty tune."),
            Command::Set {
                fqn: "Ann/trumpet".into(),
                attr: "play".into(),
                value: "You play a jaunty tune.".into()
            }
        );
        assert_eq!(
            classify("east"),
            Command::Verb {
                verb: "east".into(),
                args: String::new()
            }
        );
        assert_eq!(classify("   "), Command::Empty);
    }

    #[test]
    fn say_addresses_actor_and_room() {
        let (store, ann, room) = world();
        let messages = handle_line(&store, ann.id, "\"hello all");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "You say, \"hello all\"");
        assert_eq!(
            messages[1].to,
            Recipient::Room {
                room: room.id,
                exclude: vec![ann.id]
            }
        );
        assert_eq!(messages[1].body, "Ann says, \"hello all\"");
    }

    #[test]
    fn look_is_idempotent() {
        let (store, ann, _room) = world();
        let first = handle_line(&store, ann.id, "look");
        let second = handle_line(&store, ann.id, "look");
        assert_eq!(first, second);
        assert!(first[0].body.contains("## Welcome"));
        assert!(first[0].body.contains("[**world/Welcome**]"));
    }

    #[test]
    fn create_set_play_scenario() {
        let (store, ann, _room) = world();
        handle_line(&store, ann.id, "create trumpet A shiny trumpet.");
        let set = handle_line(&store, ann.id, "set Ann/trumpet play You play a jaunty tune.");
        assert_eq!(set[0].body, "Attribute \"play\" set on \"Ann/trumpet\".");
        let played = handle_line(&store, ann.id, "play trumpet");
        assert_eq!(actor_bodies(&played), vec!["You play a jaunty tune."]);
    }

    #[test]
    fn delete_object_then_look_fails() {
        let (store, ann, _room) = world();
        handle_line(&store, ann.id, "create trumpet A shiny trumpet.");
        let gone = handle_line(&store, ann.id, "delete Ann/trumpet");
        assert_eq!(gone[0].body, "\"Ann/trumpet\" is gone.");
        let missing = handle_line(&store, ann.id, "look trumpet");
        assert_eq!(missing[0].body, "There's no \"trumpet\" here.");
    }

    #[test]
    fn unknown_verb_is_reported_to_actor_only() {
        let (store, ann, _room) = world();
        let messages = handle_line(&store, ann.id, "flumph");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, Recipient::Actor);
        assert_eq!(messages[0].body, "I don't know how to \"flumph\".");
    }

    #[test]
    fn exit_verb_moves_the_actor() {
        let (store, ann, room) = world();
        handle_line(&store, ann.id, "build Garden A green garden.");
        handle_line(&store, ann.id, "connect Ann/Garden east A mossy gate.");
        let moved = handle_line(&store, ann.id, "east");
        assert_eq!(moved[0].body, "You leave \"Welcome\" via \"east\".");
        let garden = store.get_by_fqn("Ann/Garden").expect("garden");
        assert_eq!(store.get(ann.id).expect("ann").location, Some(garden.id));
        assert_ne!(garden.id, room.id);
        let look = handle_line(&store, ann.id, "look");
        assert!(look[0].body.contains("## Garden"));
    }

    #[test]
    fn take_and_drop_round_trip() {
        let (store, ann, room) = world();
        handle_line(&store, ann.id, "create ball A red ball.");
        let dropped = handle_line(&store, ann.id, "drop ball");
        assert_eq!(dropped[0].body, "You drop the ball.");
        let ball = store.get_by_fqn("Ann/ball").expect("ball");
        assert_eq!(ball.location, Some(room.id));
        let taken = handle_line(&store, ann.id, "take ball");
        assert_eq!(taken[0].body, "You take the ball.");
        assert_eq!(store.get(ball.id).expect("ball").location, Some(ann.id));
    }

    #[test]
    fn directed_say_is_overheard() {
        let (store, ann, room) = world();
        let bob = store.create_user("Bob", "", "pw").expect("bob");
        store.place_if_nowhere(bob.id, room.id).expect("place");
        let messages = handle_line(&store, ann.id, "@Bob nice trumpet");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].body, "You say to Bob, \"nice trumpet\"");
        assert_eq!(messages[1].to, Recipient::User(bob.id));
        assert_eq!(messages[1].body, "Ann says to you, \"nice trumpet\"");
        assert_eq!(
            messages[2].to,
            Recipient::Room {
                room: room.id,
                exclude: vec![ann.id, bob.id]
            }
        );
    }

    #[test]
    fn give_hands_a_carried_object_over() {
        let (store, ann, room) = world();
        let bob = store.create_user("Bob", "", "pw").expect("bob");
        store.place_if_nowhere(bob.id, room.id).expect("place");
        handle_line(&store, ann.id, "create ball A red ball.");

        let messages = handle_line(&store, ann.id, "give ball Bob");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].body, "You give the ball to Bob.");
        assert_eq!(messages[1].to, Recipient::User(bob.id));
        assert_eq!(messages[1].body, "Ann gives you the ball.");
        let ball = store.get_by_fqn("Ann/ball").expect("ball");
        assert_eq!(ball.location, Some(bob.id));
    }

    #[test]
    fn give_requires_recipient_in_the_room() {
        let (store, ann, _room) = world();
        let bob = store.create_user("Bob", "", "pw").expect("bob");
        handle_line(&store, ann.id, "create ball A red ball.");
        // Bob exists but is nowhere.
        let refused = handle_line(&store, ann.id, "give ball Bob");
        assert_eq!(refused[0].body, "Bob isn't here.");
        let ball = store.get_by_fqn("Ann/ball").expect("ball");
        assert_eq!(ball.location, Some(ann.id));
        assert_ne!(ball.location, Some(bob.id));
    }

    #[test]
    fn aliased_object_answers_to_both_names() {
        let (store, ann, _room) = world();
        handle_line(&store, ann.id, "create trumpet A shiny trumpet.");
        handle_line(&store, ann.id, "set Ann/trumpet play You play a jaunty tune.");
        let aliased = handle_line(&store, ann.id, "alias Ann/trumpet horn");
        assert_eq!(
            aliased[0].body,
            "\"Ann/trumpet\" now also answers to \"horn\"."
        );

        let played = handle_line(&store, ann.id, "play horn");
        assert_eq!(actor_bodies(&played), vec!["You play a jaunty tune."]);

        handle_line(&store, ann.id, "unalias Ann/trumpet horn");
        let missing = handle_line(&store, ann.id, "look horn");
        assert_eq!(missing[0].body, "There's no \"horn\" here.");
    }

    #[test]
    fn login_while_logged_in() {
        let (store, ann, _room) = world();
        let messages = handle_line(&store, ann.id, "login Ann pw");
        assert_eq!(messages[0].body, "You are already logged in.");
    }

    #[test]
    fn set_requires_fqn() {
        let (store, ann, _room) = world();
        handle_line(&store, ann.id, "create trumpet A shiny trumpet.");
        let messages = handle_line(&store, ann.id, "set trumpet play Toot.");
        assert_eq!(
            messages[0].body,
            "Usage: set <object/fqn> <attribute> <text>."
        );
    }
}

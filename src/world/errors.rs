use thiserror::Error;

/// Errors that can arise while interacting with the world model.
///
/// Every variant is recovered at the command interpreter boundary and
/// rendered as a message to the acting session only; none of them should
/// ever reach another session or abort the server.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Referenced entity, attribute, or FQN does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An FQN collision on create, rename, or clone.
    #[error("name already exists: {0}")]
    NameConflict(String),

    /// A move would place a container inside something it contains.
    #[error("illegal containment: {0}")]
    CycleDetected(String),

    /// Deleting a room while users occupy it.
    #[error("room is occupied: {0}")]
    NotEmpty(String),

    /// Mutation attempted by someone other than the owner.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Input line matched no sigil, exit, built-in, or attribute verb.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// An exit whose destination room no longer exists.
    #[error("broken exit: {0}")]
    BrokenExit(String),

    /// Arguments did not fit the command's grammar.
    #[error("{0}")]
    BadRequest(String),

    /// Bad username or password.
    #[error("login failed")]
    LoginFailed,

    /// Wrapper around IO errors (snapshot writes, directory creation).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around snapshot serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot that parsed but describes an impossible world (dangling
    /// location, containment cycle).
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Password hashing or verification failure.
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

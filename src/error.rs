use thiserror::Error;

/// Errors raised while parsing, authorizing or running a command.
/// The `Display` text is what the invoking player sees.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("You do not have permission to use this command.")]
    PermissionDenied,

    #[error("Only players can use this command.")]
    PlayerOnly,

    #[error("Missing required argument '{0}'")]
    MissingArgument(String),

    #[error("Invalid {enum_name} value '{value}' for '{argument}', expected: {expected}")]
    InvalidEnumValue {
        argument: String,
        enum_name: String,
        value: String,
        expected: String,
    },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("No player named '{0}' is online")]
    PlayerNotFound(String),

    #[error("A player named '{0}' is already online")]
    PlayerAlreadyOnline(String),

    #[error("No entity with network id {0}")]
    EntityNotFound(u64),

    #[error("No pending form {id} for {player}")]
    NoPendingForm { player: String, id: u32 },

    #[error("Ambiguous value '{value}' for '{argument}', could be: {candidates}")]
    AmbiguousEnumValue {
        argument: String,
        value: String,
        candidates: String,
    },

    #[error("Unexpected trailing arguments: {0}")]
    TrailingArguments(String),

    #[error("Command '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("No pending form {0} for this player")]
    UnknownForm(u32),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Behavior '{0}' is already registered")]
    AlreadyRegistered(&'static str),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed world save: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported world save version {found} (expected at most {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

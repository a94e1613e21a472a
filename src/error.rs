use thiserror::Error;

/// Which id namespace an unknown reference pointed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Item,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Item => write!(f, "item"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown {kind} id: {id}")]
    UnknownEntity { kind: EntityKind, id: String },

    #[error("insufficient training data: {actual} ratings, at least {required} required")]
    InsufficientData { required: usize, actual: usize },

    #[error("no model has been trained or loaded")]
    ModelNotReady,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("model i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model encoding failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unsupported model format version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("model blob failed consistency check: {0}")]
    Corrupt(String),
}

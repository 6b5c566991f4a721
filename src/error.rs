use thiserror::Error;

/// Failures surfaced by the engine. Every variant is distinguishable at the
/// caller; an empty similarity result below the active threshold is a normal
/// return value, not an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown {entity} id {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("no rated or liked items supplied")]
    EmptyInput,

    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("trained artifact `{0}` is missing")]
    ArtifactMissing(String),

    #[error("artifact version mismatch: expected {expected}, found {found}")]
    ArtifactVersionMismatch { expected: u64, found: u64 },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    pub fn user_not_found(id: i64) -> Self {
        EngineError::NotFound { entity: "user", id }
    }

    pub fn movie_not_found(id: i64) -> Self {
        EngineError::NotFound { entity: "movie", id }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

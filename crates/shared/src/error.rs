//! Error types for VMS

use thiserror::Error;

/// Error thrown when a record does not exist for the tenant
#[derive(Debug, Error)]
#[error("{kind} '{id}' not found")]
pub struct NotFoundError {
    pub kind: String,
    pub id: String,
}

impl NotFoundError {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Error thrown when input fails validation
#[derive(Debug, Error)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error thrown when a state machine refuses a transition
#[derive(Debug, Error)]
#[error("Cannot move {entity} from '{from}' to '{to}'")]
pub struct InvalidTransitionError {
    pub entity: String,
    pub from: String,
    pub to: String,
}

impl InvalidTransitionError {
    pub fn new(entity: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

/// General VMS error type
#[derive(Debug, Error)]
pub enum VmsError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl VmsError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        NotFoundError::new(kind, id).into()
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::new(field, message).into()
    }
}

pub type Result<T> = std::result::Result<T, VmsError>;

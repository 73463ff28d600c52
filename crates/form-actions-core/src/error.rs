use thiserror::Error;

use crate::recipe::{ActionKind, Role};

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("{kind} recipe is missing required role {role}")]
    MissingRequiredRole { kind: ActionKind, role: Role },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl ActionError {
    pub(crate) fn malformed(e: impl std::fmt::Display) -> Self {
        ActionError::MalformedDocument(e.to_string())
    }
}

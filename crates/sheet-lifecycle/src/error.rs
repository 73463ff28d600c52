use form_actions_core::ActionError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Sheet not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid file name: expected a non-empty .pdf name without path separators")]
    InvalidFileName,

    #[error("Storage error: {0}")]
    Storage(#[source] std::io::Error),
}

impl From<std::io::Error> for SheetError {
    fn from(e: std::io::Error) -> Self {
        SheetError::Storage(e)
    }
}

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] homestead_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Collection name cannot be empty")]
    EmptyCollection,
    #[error("No fields provided; pass key=value pairs")]
    EmptyFields,
    #[error("Invalid field '{0}': expected key=value")]
    InvalidField(String),
    #[error("Invalid range bound '{0}': expected YYYY-MM-DD, RFC 3339, or unix ms")]
    InvalidRangeBound(String),
    #[error("Record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: String },
    #[error("Edited record must be a JSON object")]
    InvalidEditedRecord,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No user configured. Run `homestead config init --user-id <id>` or set HOMESTEAD_USER_ID."
    )]
    NotSignedIn,
    #[error("Refusing to discard offline data without --yes")]
    ConfirmationRequired,
}

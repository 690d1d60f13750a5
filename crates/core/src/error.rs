use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbiscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed compiled unit {}: {reason}", .path.display())]
    MalformedUnit { path: PathBuf, reason: String },
    #[error("Failed to add, node for {0} already exists")]
    AlreadyExists(String),
    #[error("Source file of {0} is unknown")]
    UnknownSource(String),
    #[error("Could not resolve declared type of {}: {reason}", .path.display())]
    SourceParse { path: PathBuf, reason: String },
    #[error("Incremental cache error: {0}")]
    Cache(String),
    #[error("Compiler backend error: {0}")]
    Backend(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AbiscopeError {
    /// Errors after which the persisted incremental state can no longer be trusted.
    pub fn requires_full_rebuild(&self) -> bool {
        matches!(self, AbiscopeError::UnknownSource(_) | AbiscopeError::Cache(_))
    }
}

pub type Result<T> = std::result::Result<T, AbiscopeError>;

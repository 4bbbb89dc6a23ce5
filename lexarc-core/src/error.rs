/*!
Error types for the lexarc core engine.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the lexarc core.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur during archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the underlying zip container
    #[error("Container error: {0}")]
    Container(#[from] zip::result::ZipError),

    /// JSON errors while reading engine configuration
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The file is not a recognizable project archive
    #[error("File {0} is not a valid project archive")]
    NotAnArchive(PathBuf),

    /// A named entry is missing from the archive
    #[error("Entry {entry} not found in archive {archive}")]
    EntryNotFound { archive: PathBuf, entry: String },

    /// The primary document could not be parsed, even after recovery
    #[error("Unrecoverable document: {0}")]
    UnrecoverableDocument(String),

    /// Self-verification of a freshly written archive failed.
    ///
    /// The previously persisted file is untouched when this is returned.
    #[error("Written archive failed verification and does not match the project in memory: {0}")]
    VerificationFailed(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ArchiveError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new unrecoverable-document error
    pub fn unrecoverable<S: Into<String>>(msg: S) -> Self {
        Self::UnrecoverableDocument(msg.into())
    }

    /// Create a new verification failure
    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Self::VerificationFailed(msg.into())
    }
}

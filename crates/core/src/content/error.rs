//! Error types for content readers and writers.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by content collaborators.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Backing file is missing.
    #[error("Content not found: {path}")]
    NotFound { path: PathBuf },

    /// Writer has not been written yet, so it cannot be read back.
    #[error("Content has not been written yet: {description}")]
    NotWritten { description: String },

    /// Spool directory could not be prepared.
    #[error("Failed to create spool directory: {path}")]
    SpoolDirectoryFailed { path: PathBuf },

    /// I/O error while streaming content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for ingestion operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed field data (stray or unterminated quote).
    #[error("Bad data at line {line}: {message}")]
    BadData { line: usize, message: String },

    /// A data row does not have as many cells as the header.
    #[error("Column count mismatch at line {line}: expected {expected}, found {found}")]
    ColumnCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The file could not be locked for exclusive reading.
    #[error("File is locked by another process: {0}")]
    Locked(PathBuf),

    /// Directory walk failure.
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// A non-fatal failure recorded against one file or path specification entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionException {
    /// The offending file or path entry.
    pub file: PathBuf,
    /// Human readable description.
    pub message: String,
}

impl IngestionException {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Record an error that stopped processing of `file`.
    pub fn from_error(file: &Path, error: &IngestError) -> Self {
        Self::new(file, format!("processing failed: {error}"))
    }
}

impl fmt::Display for IngestionException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.file.display(), self.message)
    }
}

impl std::error::Error for IngestionException {}

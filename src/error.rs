//! Error types for CaskKV
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskKV operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Malformed record header: expected {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    #[error("Truncated record: expected {expected} bytes, got {actual}")]
    TruncatedRecord { expected: usize, actual: usize },

    #[error("Record key does not match the indexed key")]
    KeyMismatch,

    // -------------------------------------------------------------------------
    // Data Directory Errors
    // -------------------------------------------------------------------------
    #[error("Data directory is locked by another handle: {0}")]
    DirectoryLocked(PathBuf),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// Whether this error came from decoding a record rather than from the OS
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            CaskError::MalformedHeader { .. } | CaskError::TruncatedRecord { .. } | CaskError::KeyMismatch
        )
    }
}

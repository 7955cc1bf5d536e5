//! Error types for package operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Manifest validation error.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// The output file exists and overwriting was not requested.
    #[error("{} already exists. Specify -o to overwrite.", .0.display())]
    AlreadyExists(PathBuf),

    /// Missing required file or directory.
    #[error("Missing required file: {0}")]
    MissingFile(String),
}

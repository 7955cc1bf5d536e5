//! Error types for assembly inspection.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading an assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// I/O error while reading the module file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a PE image.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// A read ran past the end of a structure.
    #[error("Unexpected end of data: needed {needed} bytes at offset {offset:#x}")]
    Truncated { offset: usize, needed: usize },

    /// The CLI metadata is present but cannot be decoded.
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// The module references the host SDK but lacks a usable declaration.
    #[error("Invalid extension {}: {reason}", path.display())]
    MalformedPlugin { path: PathBuf, reason: String },
}

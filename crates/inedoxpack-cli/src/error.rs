//! Error types for the packaging pipeline.

use inedoxpack_assembly::AssemblyError;
use inedoxpack_bundle::BundleError;
use thiserror::Error;

/// Errors that abort a packaging run.
///
/// Each variant renders as the single line printed to stderr.
#[derive(Debug, Error)]
pub enum PackError {
    /// A path was not found or did not hold exactly one extension.
    #[error("{0}")]
    Discovery(String),

    /// A module references the SDK but cannot be read as an extension.
    #[error("{0}")]
    MalformedPlugin(String),

    /// Builds of a multitargeted extension disagree.
    #[error("{0}")]
    Reconciliation(String),

    /// Invalid override, existing output or archive writer failure.
    #[error("{0}")]
    Package(String),

    /// The external build failed.
    #[error("{0}")]
    Build(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Process exit code reported for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            PackError::Discovery(_) => 2,
            PackError::MalformedPlugin(_) => 3,
            PackError::Reconciliation(_) => 4,
            PackError::Package(_) => 5,
            PackError::Build(_) => 6,
            PackError::Io(_) => 7,
        }
    }
}

impl From<AssemblyError> for PackError {
    fn from(err: AssemblyError) -> Self {
        match err {
            AssemblyError::Io(e) => PackError::Io(e),
            other => PackError::MalformedPlugin(other.to_string()),
        }
    }
}

impl From<BundleError> for PackError {
    fn from(err: BundleError) -> Self {
        PackError::Package(err.to_string())
    }
}

/// Result type for the packaging pipeline.
pub type PackResult<T> = Result<T, PackError>;

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::path::PathBuf;
    use test_case::test_case;

    #[test_case(PackError::Discovery("x".into()), 2)]
    #[test_case(PackError::MalformedPlugin("x".into()), 3)]
    #[test_case(PackError::Reconciliation("x".into()), 4)]
    #[test_case(PackError::Package("x".into()), 5)]
    #[test_case(PackError::Build("x".into()), 6)]
    #[test_case(PackError::Io(std::io::Error::other("x")), 7)]
    fn PackError___exit_code___is_distinct_per_kind(err: PackError, code: u8) {
        assert_eq!(err.exit_code(), code);
    }

    #[test]
    fn PackError___from_assembly_error___keeps_io_separate() {
        let io: PackError = AssemblyError::Io(std::io::Error::other("disk")).into();
        let malformed: PackError = AssemblyError::MalformedPlugin {
            path: PathBuf::from("Ext.dll"),
            reason: "missing TargetFrameworkAttribute".to_string(),
        }
        .into();

        assert!(matches!(io, PackError::Io(_)));
        assert!(matches!(malformed, PackError::MalformedPlugin(_)));
        assert!(malformed.to_string().contains("Ext.dll"));
    }

    #[test]
    fn PackError___from_already_exists___keeps_overwrite_hint() {
        let err: PackError = BundleError::AlreadyExists(PathBuf::from("out/Ext.upack")).into();

        assert_eq!(err.exit_code(), 5);
        assert_eq!(
            err.to_string(),
            "out/Ext.upack already exists. Specify -o to overwrite."
        );
    }
}

//! Universal Package format for inedoxpack
//!
//! This crate provides types and utilities for creating and reading `.upack`
//! (Universal Package) archives - zip files holding a `upack.json` manifest
//! and the package contents.
//!
//! # Package Structure
//!
//! ```text
//! InedoCore.upack
//! ├── upack.json
//! └── package/
//!     ├── net452/
//!     │   └── InedoCore.dll
//!     └── net8.0/
//!         ├── InedoCore.dll
//!         └── runtimes/
//!             └── win-x64/
//!                 └── native/
//!                     └── git2.dll
//! ```
//!
//! A package built for a single framework keeps its files directly under
//! `package/`.
//!
//! # Example
//!
//! ```no_run
//! use inedoxpack_bundle::{PackageBuilder, UniversalManifest, include_runtime_asset};
//!
//! let manifest = UniversalManifest::new("inedox", "InedoCore", semver::Version::new(3, 0, 0));
//! let digest = PackageBuilder::new(manifest)
//!     .add_contents("bin/Release/net8.0", "", include_runtime_asset)?
//!     .write("InedoCore.upack")?;
//! println!("sha256:{digest}");
//! # Ok::<(), inedoxpack_bundle::BundleError>(())
//! ```

mod error;
mod filter;
mod manifest;

pub mod builder;
pub mod loader;

pub use builder::PackageBuilder;
pub use error::BundleError;
pub use filter::include_runtime_asset;
pub use loader::PackageReader;
pub use manifest::UniversalManifest;

/// Result type for package operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Package file extension.
pub const PACKAGE_EXTENSION: &str = "upack";

/// Manifest file name within the package.
pub const MANIFEST_FILE: &str = "upack.json";

/// Directory within the package holding its contents.
pub const CONTENT_DIRECTORY: &str = "package";

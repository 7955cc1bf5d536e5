//! Extension metadata extraction for inedoxpack
//!
//! This crate inspects compiled .NET assemblies (PE images carrying ECMA-335
//! metadata) and recovers the identity of Inedo extensions without executing
//! or loading them. Only the metadata tables are read; referenced assemblies
//! such as `Inedo.SDK` are never resolved.
//!
//! # Example
//!
//! ```no_run
//! use inedoxpack_assembly::PluginMetadata;
//!
//! match PluginMetadata::read("bin/Release/net8.0/MyExtension.dll")? {
//!     Some(info) => println!("found {} ({})", info.name, info.target_platform),
//!     None => println!("not an extension"),
//! }
//! # Ok::<(), inedoxpack_assembly::AssemblyError>(())
//! ```

mod attribute;
mod error;
mod metadata;
mod module;
mod pe;
mod platform;
mod plugin;
mod product;
mod reader;
mod version;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;

pub use attribute::decode_applies_to;
pub use error::AssemblyError;
pub use platform::{PlatformSet, TargetPlatform};
pub use plugin::{HOST_SDK_ASSEMBLY, PluginMetadata};
pub use product::{HostProduct, HostProducts};
pub use version::AssemblyVersion;

/// Result type for assembly inspection.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// File extension of the modules probed during discovery.
pub const MODULE_EXTENSION: &str = "dll";

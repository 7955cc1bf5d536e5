//! Turning reconciled extension builds into a Universal Package.

use std::path::{Path, PathBuf};

use inedoxpack_assembly::{PlatformSet, PluginMetadata};
use inedoxpack_bundle::{
    BundleError, PACKAGE_EXTENSION, PackageBuilder, UniversalManifest, include_runtime_asset,
};
use semver::Version;
use tracing::debug;

use crate::error::{PackError, PackResult};

/// Package group every extension is published under.
pub const PACKAGE_GROUP: &str = "inedox";

pub const SDK_VERSION_PROPERTY: &str = "_inedoSdkVersion";
pub const PRODUCTS_PROPERTY: &str = "_inedoProducts";
pub const TARGET_FRAMEWORKS_PROPERTY: &str = "_targetFrameworks";

/// Parse the `--version` argument.
pub fn parse_version_override(text: &str) -> PackResult<Version> {
    Version::parse(text.trim()).map_err(|e| {
        debug!("Rejected version override '{text}': {e}");
        PackError::Package("Invalid version specified for --version argument.".to_string())
    })
}

/// Build the `upack.json` manifest for a reconciled extension.
///
/// `first` is the baseline record. The record's own icon takes precedence
/// over `icon_override`.
pub fn package_manifest(
    first: &PluginMetadata,
    platforms: PlatformSet,
    version_override: Option<&Version>,
    icon_override: Option<&str>,
) -> UniversalManifest {
    let version = version_override.cloned().unwrap_or_else(|| {
        Version::new(
            u64::from(first.version.major),
            u64::from(first.version.minor),
            u64::from(first.version.build_or_zero()),
        )
    });

    let mut manifest = UniversalManifest::new(PACKAGE_GROUP, &first.name, version);
    manifest.title = first.title.clone();
    manifest.description = first.description.clone();
    manifest.icon = first
        .icon_url
        .clone()
        .or_else(|| icon_override.map(String::from));

    manifest.set_property(SDK_VERSION_PROPERTY, first.sdk_version.to_string_n(3));
    manifest.set_property(PRODUCTS_PROPERTY, first.products.names());
    manifest.set_property(TARGET_FRAMEWORKS_PROPERTY, platforms.names());
    manifest
}

/// Where the package is written.
///
/// A relative `output` (or the default `<name>.upack`) is placed under
/// `output_dir`; an absolute `output` is used as is.
pub fn resolve_output_path(
    output_dir: &Path,
    output: Option<&Path>,
    package_name: &str,
) -> PathBuf {
    match output {
        Some(output) => output_dir.join(output),
        None => output_dir.join(format!("{package_name}.{PACKAGE_EXTENSION}")),
    }
}

/// Fail early when `path` exists and may not be replaced.
pub fn ensure_writable(path: &Path, overwrite: bool) -> PackResult<()> {
    if !overwrite && path.exists() {
        return Err(BundleError::AlreadyExists(path.to_path_buf()).into());
    }
    Ok(())
}

/// Write the package and return its SHA-256 (hex).
///
/// A single build is stored directly under `package/`; multiple builds go
/// to `package/<framework>/`. Runtime assets for unsupported platforms are
/// left out.
pub fn write_package(
    records: &[PluginMetadata],
    manifest: UniversalManifest,
    output_path: &Path,
    overwrite: bool,
) -> PackResult<String> {
    let mut builder = PackageBuilder::new(manifest).overwrite(overwrite);

    match records {
        [single] => {
            builder = builder.add_contents(&single.containing_path, "", include_runtime_asset)?;
        }
        _ => {
            for record in records {
                builder = builder.add_contents(
                    &record.containing_path,
                    record.target_platform.as_str(),
                    include_runtime_asset,
                )?;
            }
        }
    }

    Ok(builder.write(output_path)?)
}

#[cfg(test)]
#[path = "package/package_tests.rs"]
mod package_tests;

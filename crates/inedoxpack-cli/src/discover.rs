//! Locating the extension builds to package.
//!
//! A source path is either a single module file, a directory holding one
//! extension build, or a directory with one subdirectory per target
//! platform (`net452`, `net5.0`, `net6.0`, `net8.0`).

use std::path::{Path, PathBuf};

use inedoxpack_assembly::{AssemblyError, MODULE_EXTENSION, PluginMetadata, TargetPlatform};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PackError, PackResult};

/// Find the extension builds under `root`.
///
/// `expected_name` restricts the search to `<expected_name>.dll`. When
/// `show_search_root` is false the "Searching ..." line is omitted, which
/// is used when `root` is a staging directory.
pub fn discover(
    root: &Path,
    expected_name: Option<&str>,
    show_search_root: bool,
) -> PackResult<Vec<PluginMetadata>> {
    if is_module_path(root) {
        return read_single_module(root, expected_name);
    }

    if !root.is_dir() {
        return Err(PackError::Discovery(format!("{} not found.", root.display())));
    }

    if show_search_root {
        println!("Searching {} for extensions...", root.display());
    }

    let mut records = Vec::new();
    for (subdir, platform) in platform_subdirectories(root)? {
        println!("Found {platform} subdirectory; looking for {platform} extension...");

        let record = scan_directory(&subdir, expected_name)?;
        if record.target_platform != platform {
            return Err(PackError::Discovery(format!(
                "Expected {platform} extension in {} but found {} instead.",
                subdir.display(),
                record.target_platform
            )));
        }
        records.push(record);
    }

    if records.is_empty() {
        records.push(scan_directory(root, expected_name)?);
    }

    Ok(records)
}

fn read_single_module(path: &Path, expected_name: Option<&str>) -> PackResult<Vec<PluginMetadata>> {
    println!("Reading {}...", path.display());

    if let Some(name) = expected_name
        && path.file_stem().and_then(|s| s.to_str()) != Some(name)
    {
        return Err(PackError::Discovery(format!(
            "Extension assembly {} has incorrect name (expected {name}).",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(PackError::Discovery(format!("{} not found.", path.display())));
    }

    match PluginMetadata::read(path)? {
        Some(record) => Ok(vec![record]),
        None => Err(PackError::Discovery(format!(
            "Invalid extension assembly: {}",
            path.display()
        ))),
    }
}

/// Find the single extension in `dir`.
fn scan_directory(dir: &Path, expected_name: Option<&str>) -> PackResult<PluginMetadata> {
    if let Some(name) = expected_name {
        let path = dir.join(format!("{name}.{MODULE_EXTENSION}"));
        if !path.is_file() {
            return Err(PackError::Discovery(format!("{} not found.", path.display())));
        }

        return PluginMetadata::read(&path)?.ok_or_else(|| {
            PackError::Discovery(format!("Invalid extension: {}", path.display()))
        });
    }

    let mut found: Option<PluginMetadata> = None;
    for path in modules_in(dir)? {
        let Some(record) = read_candidate(&path)? else {
            continue;
        };

        if found.is_some() {
            return Err(PackError::Discovery(
                "Found more than one assembly that references Inedo.SDK. Use the --name argument to specify the primary assembly name."
                    .to_string(),
            ));
        }
        found = Some(record);
    }

    found.ok_or_else(|| {
        PackError::Discovery(format!("No extensions were found in {}", dir.display()))
    })
}

/// Probe one module found by enumeration.
fn read_candidate(path: &Path) -> PackResult<Option<PluginMetadata>> {
    match PluginMetadata::read(path) {
        Ok(record) => Ok(record),
        // a module that cannot be decoded at all is not a candidate
        Err(AssemblyError::Truncated { .. } | AssemblyError::MalformedMetadata(_)) => {
            debug!("Skipping undecodable module {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Recognised platform subdirectories of `root`, in file-name order.
fn platform_subdirectories(root: &Path) -> PackResult<Vec<(PathBuf, TargetPlatform)>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(platform) = entry.file_name().to_str().and_then(TargetPlatform::parse) {
            found.push((entry.into_path(), platform));
        }
    }
    Ok(found)
}

/// `*.dll` files directly inside `dir`, in file-name order.
fn modules_in(dir: &Path) -> PackResult<Vec<PathBuf>> {
    let mut modules = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_module_path(entry.path()) {
            modules.push(entry.into_path());
        }
    }
    Ok(modules)
}

fn is_module_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MODULE_EXTENSION))
}

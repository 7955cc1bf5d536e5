//! Platform-specific asset filtering.
//!
//! Publish output carries native assets for every runtime identifier under
//! `runtimes/<rid>/`. Inedo products only run on 64-bit Windows and Linux, so
//! assets for other runtimes are left out of the package.

const RUNTIMES_DIRECTORY: &str = "runtimes";

/// Decide whether a file belongs in the package.
///
/// `relative_path` is relative to the directory being packaged; `/` and `\`
/// are both accepted as separators. Files outside `runtimes/<rid>/` are
/// always included.
///
/// # Example
///
/// ```
/// use inedoxpack_bundle::include_runtime_asset;
///
/// assert!(include_runtime_asset("InedoCore.dll"));
/// assert!(include_runtime_asset("runtimes/win-x64/native/git2.dll"));
/// assert!(!include_runtime_asset("runtimes/osx-arm64/native/libgit2.dylib"));
/// ```
#[must_use]
pub fn include_runtime_asset(relative_path: &str) -> bool {
    let path = relative_path.trim_start_matches(['/', '\\']);

    let Some(rest) = path
        .strip_prefix(RUNTIMES_DIRECTORY)
        .and_then(|rest| rest.strip_prefix(['/', '\\']))
    else {
        return true;
    };

    match rest.find(['/', '\\']) {
        Some(end) if end > 0 => is_supported_runtime(&rest[..end]),
        _ => true,
    }
}

/// Whether assets for runtime identifier `rid` are kept.
fn is_supported_runtime(rid: &str) -> bool {
    if rid.contains('-') && !rid.ends_with("-x64") {
        return false;
    }
    rid.starts_with("win") || rid.starts_with("linux") || rid.starts_with("unix")
}

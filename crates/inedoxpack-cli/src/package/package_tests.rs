#![allow(non_snake_case)]

use super::*;
use inedoxpack_assembly::{AssemblyVersion, HostProducts, TargetPlatform};
use inedoxpack_bundle::PackageReader;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use test_case::test_case;

fn record(platform: TargetPlatform, containing_path: &Path) -> PluginMetadata {
    PluginMetadata {
        containing_path: containing_path.to_path_buf(),
        name: "InedoCore".to_string(),
        version: AssemblyVersion::new(3, 1, 2, 9),
        sdk_version: AssemblyVersion::new(2, 4, 1, 0),
        target_platform: platform,
        products: HostProducts::from_bits(0x1 | 0x4),
        title: Some("Inedo Core".to_string()),
        description: Some("Core extension".to_string()),
        icon_url: None,
    }
}

fn publish_dir(root: &Path, name: &str) -> PathBuf {
    let dir = root.join(name);
    for (path, contents) in [
        ("InedoCore.dll", "module"),
        ("runtimes/win-x64/native/git2.dll", "win64"),
        ("runtimes/osx-arm64/native/libgit2.dylib", "mac"),
    ] {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

// =============================================================================
// Manifest
// =============================================================================

#[test]
fn package_manifest___derives_fields_from_first_record() {
    let first = record(TargetPlatform::Net452, Path::new("a"));
    let platforms = [TargetPlatform::Net80, TargetPlatform::Net452]
        .into_iter()
        .collect();

    let manifest = package_manifest(&first, platforms, None, None);
    let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();

    assert_eq!(
        value,
        json!({
            "group": "inedox",
            "name": "InedoCore",
            "version": "3.1.2",
            "title": "Inedo Core",
            "description": "Core extension",
            "_inedoSdkVersion": "2.4.1",
            "_inedoProducts": ["BuildMaster", "ProGet"],
            "_targetFrameworks": ["net452", "net8.0"],
        })
    );
}

#[test]
fn package_manifest___undefined_build___becomes_zero() {
    let mut first = record(TargetPlatform::Net80, Path::new("a"));
    first.version = AssemblyVersion::with_major_minor(4, 2);

    let manifest = package_manifest(&first, PlatformSet::empty(), None, None);

    assert_eq!(manifest.version, Version::new(4, 2, 0));
}

#[test]
fn package_manifest___version_override___replaces_assembly_version() {
    let first = record(TargetPlatform::Net80, Path::new("a"));
    let version = Version::parse("5.0.0-rc.1").unwrap();

    let manifest = package_manifest(&first, PlatformSet::empty(), Some(&version), None);

    assert_eq!(manifest.version.to_string(), "5.0.0-rc.1");
}

#[test]
fn package_manifest___icon_override___used_only_when_record_has_none() {
    let mut first = record(TargetPlatform::Net80, Path::new("a"));

    let manifest = package_manifest(&first, PlatformSet::empty(), None, Some("https://x/icon.png"));
    assert_eq!(manifest.icon.as_deref(), Some("https://x/icon.png"));

    first.icon_url = Some("https://own/icon.png".to_string());
    let manifest = package_manifest(&first, PlatformSet::empty(), None, Some("https://x/icon.png"));
    assert_eq!(manifest.icon.as_deref(), Some("https://own/icon.png"));
}

#[test]
fn package_manifest___no_products___writes_empty_list() {
    let mut first = record(TargetPlatform::Net80, Path::new("a"));
    first.products = HostProducts::UNSPECIFIED;

    let manifest = package_manifest(&first, PlatformSet::empty(), None, None);

    assert_eq!(manifest.property(PRODUCTS_PROPERTY), Some(&json!([])));
}

#[test_case("1.2.3")]
#[test_case("1.2.3-beta.4")]
#[test_case(" 2.0.0 ")]
fn parse_version_override___accepts_semantic_versions(text: &str) {
    assert!(parse_version_override(text).is_ok());
}

#[test_case("")]
#[test_case("1.2")]
#[test_case("v1.2.3")]
#[test_case("1.2.3.4")]
fn parse_version_override___rejects_other_text(text: &str) {
    let err = parse_version_override(text).unwrap_err();

    assert_eq!(err.to_string(), "Invalid version specified for --version argument.");
    assert_eq!(err.exit_code(), 5);
}

// =============================================================================
// Output path
// =============================================================================

#[test]
fn resolve_output_path___defaults_to_package_name_in_output_dir() {
    let path = resolve_output_path(Path::new("/out"), None, "InedoCore");

    assert_eq!(path, PathBuf::from("/out/InedoCore.upack"));
}

#[test]
fn resolve_output_path___relative_output___is_under_output_dir() {
    let path = resolve_output_path(Path::new("/out"), Some(Path::new("pkgs/x.upack")), "InedoCore");

    assert_eq!(path, PathBuf::from("/out/pkgs/x.upack"));
}

#[test]
fn resolve_output_path___absolute_output___is_kept() {
    let path = resolve_output_path(Path::new("/out"), Some(Path::new("/tmp/x.upack")), "InedoCore");

    assert_eq!(path, PathBuf::from("/tmp/x.upack"));
}

#[test]
fn ensure_writable___existing_file___requires_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("InedoCore.upack");
    fs::write(&path, "previous").unwrap();

    let err = ensure_writable(&path, false).unwrap_err();

    assert!(err.to_string().ends_with("already exists. Specify -o to overwrite."));
    assert!(ensure_writable(&path, true).is_ok());
    assert!(ensure_writable(&temp.path().join("new.upack"), false).is_ok());
}

// =============================================================================
// Archive
// =============================================================================

#[test]
fn write_package___single_build___stores_content_at_package_root() {
    let temp = TempDir::new().unwrap();
    let dir = publish_dir(temp.path(), "bin");
    let records = [record(TargetPlatform::Net80, &dir)];
    let manifest = package_manifest(&records[0], reconcile_platforms(&records), None, None);
    let output = temp.path().join("InedoCore.upack");

    write_package(&records, manifest, &output, false).unwrap();

    let reader = PackageReader::open(&output).unwrap();
    assert_eq!(
        reader.content_files(),
        vec!["InedoCore.dll", "runtimes/win-x64/native/git2.dll"]
    );
}

#[test]
fn write_package___multiple_builds___use_framework_folders() {
    let temp = TempDir::new().unwrap();
    let legacy = publish_dir(temp.path(), "net452");
    let modern = publish_dir(temp.path(), "net8.0");
    let records = [
        record(TargetPlatform::Net452, &legacy),
        record(TargetPlatform::Net80, &modern),
    ];
    let manifest = package_manifest(&records[0], reconcile_platforms(&records), None, None);
    let output = temp.path().join("InedoCore.upack");

    let digest = write_package(&records, manifest, &output, false).unwrap();

    let reader = PackageReader::open(&output).unwrap();
    assert_eq!(
        reader.content_files(),
        vec![
            "net452/InedoCore.dll",
            "net452/runtimes/win-x64/native/git2.dll",
            "net8.0/InedoCore.dll",
            "net8.0/runtimes/win-x64/native/git2.dll",
        ]
    );
    assert_eq!(digest.len(), 64);
}

#[test]
fn write_package___missing_content_directory___leaves_no_output() {
    let temp = TempDir::new().unwrap();
    let records = [record(TargetPlatform::Net80, &temp.path().join("gone"))];
    let manifest = package_manifest(&records[0], reconcile_platforms(&records), None, None);
    let output = temp.path().join("InedoCore.upack");

    let result = write_package(&records, manifest, &output, false);

    assert!(matches!(result, Err(PackError::Package(_))));
    assert!(!output.exists());
}

fn reconcile_platforms(records: &[PluginMetadata]) -> PlatformSet {
    records.iter().map(|r| r.target_platform).collect()
}

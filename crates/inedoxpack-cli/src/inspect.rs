//! Inspect command implementation

use std::fs;
use std::path::Path;

use inedoxpack_bundle::PackageReader;
use inedoxpack_bundle::builder::compute_sha256;
use serde_json::Value;

use crate::error::PackResult;

/// Print the manifest and contents of a package.
pub fn run(package_path: &Path) -> PackResult<()> {
    let reader = PackageReader::open(package_path)?;
    let manifest = reader.manifest();

    println!("Package: {} {}", manifest.full_name(), manifest.version);
    if let Some(title) = &manifest.title {
        println!("Title: {title}");
    }
    if let Some(description) = &manifest.description {
        println!("Description: {description}");
    }
    if let Some(icon) = &manifest.icon {
        println!("Icon: {icon}");
    }

    if !manifest.properties.is_empty() {
        println!("\nProperties:");
        for (key, value) in &manifest.properties {
            println!("  {key}: {}", render_property(value));
        }
    }

    println!("\nFiles:");
    for file in reader.content_files() {
        println!("  {file}");
    }

    println!("\nsha256: {}", compute_sha256(&fs::read(package_path)?));
    Ok(())
}

/// Strings and string lists print bare; anything else prints as JSON.
fn render_property(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

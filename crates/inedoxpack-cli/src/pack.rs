//! Pack command implementation

use std::path::{Path, PathBuf};

use clap::Args;
use semver::Version;

use crate::build::{
    CLEANUP_ATTEMPTS, CLEANUP_DELAY, ProjectBuild, create_staging_dir, remove_staging_dir,
};
use crate::config::Settings;
use crate::discover::discover;
use crate::error::PackResult;
use crate::package::{
    ensure_writable, package_manifest, parse_version_override, resolve_output_path, write_package,
};
use crate::reconcile::reconcile;

/// Arguments of `inedoxpack pack`.
#[derive(Args, Debug, Clone, Default)]
pub struct PackArgs {
    /// Extension directory or assembly (default: current directory)
    pub source: Option<PathBuf>,

    /// Output package (default: <PackageName>.upack in INEDOXPACK_OUTDIR or the current directory)
    pub output: Option<PathBuf>,

    /// Overwrite the output package if it exists
    #[arg(short = 'o', long)]
    pub overwrite: bool,

    /// Name of the primary extension assembly
    #[arg(long)]
    pub name: Option<String>,

    /// Package version to use instead of the assembly version
    #[arg(long = "version", value_name = "VERSION")]
    pub version_override: Option<String>,

    /// Icon URL to use when the assembly declares none
    #[arg(long, value_name = "URL")]
    pub icon_url: Option<String>,

    /// Run `dotnet publish` with this configuration (Debug/Release) first
    #[arg(long, value_name = "CONFIGURATION")]
    pub build: Option<String>,
}

/// Run the pack command.
pub async fn run(args: PackArgs, settings: &Settings) -> PackResult<()> {
    let version_override = args
        .version_override
        .as_deref()
        .map(parse_version_override)
        .transpose()?;

    let source = match &args.source {
        Some(source) => settings.current_dir.join(source),
        None => settings.current_dir.clone(),
    };

    let Some(configuration) = &args.build else {
        return package(&source, false, &args, version_override.as_ref(), settings);
    };

    let project = ProjectBuild::load(&source, configuration)?;
    let staging = create_staging_dir()?;

    let result = match project.publish_all(&staging).await {
        Ok(()) => package(&staging, true, &args, version_override.as_ref(), settings),
        Err(e) => Err(e),
    };

    remove_staging_dir(&staging, CLEANUP_ATTEMPTS, CLEANUP_DELAY).await;
    result
}

/// Discover, reconcile and write the package for the builds under `source`.
///
/// `staged` marks `source` as a build staging directory, whose path is not
/// worth showing.
fn package(
    source: &Path,
    staged: bool,
    args: &PackArgs,
    version_override: Option<&Version>,
    settings: &Settings,
) -> PackResult<()> {
    let records = discover(source, args.name.as_deref(), !staged)?;

    for record in &records {
        let location = if staged {
            record
                .containing_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            record.containing_path.display().to_string()
        };
        println!(
            "{location}: found {} ({})",
            record.name, record.target_platform
        );
    }

    let platforms = reconcile(&records, version_override.is_some())?;
    // reconcile rejects an empty list
    let first = &records[0];

    println!("Name: {}", first.name);
    println!("Version: {}", first.version);
    println!("SDK version: {}", first.sdk_version.to_string_n(3));
    println!("Title: {}", first.title.as_deref().unwrap_or_default());
    println!(
        "Description: {}",
        first.description.as_deref().unwrap_or_default()
    );
    println!(
        "Icon: {}",
        first
            .icon_url
            .as_deref()
            .or(args.icon_url.as_deref())
            .unwrap_or_default()
    );

    let manifest = package_manifest(first, platforms, version_override, args.icon_url.as_deref());

    let output_path =
        resolve_output_path(&settings.output_dir, args.output.as_deref(), &manifest.name);
    ensure_writable(&output_path, args.overwrite)?;

    println!("Writing {}...", output_path.display());
    let digest = write_package(&records, manifest, &output_path, args.overwrite)?;

    println!("Package created.");
    println!("sha256: {digest}");
    Ok(())
}

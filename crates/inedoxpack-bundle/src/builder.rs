//! Package creation utilities.
//!
//! The [`PackageBuilder`] provides a fluent API for creating `.upack` archives.

use crate::{BundleError, BundleResult, CONTENT_DIRECTORY, MANIFEST_FILE, UniversalManifest};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Builder for creating Universal Packages.
///
/// Files are only read when the package is written. The archive is first
/// written to a temporary file next to the output path and moved into place
/// once complete, so a failed write never leaves a partial package behind.
///
/// # Example
///
/// ```no_run
/// use inedoxpack_bundle::{PackageBuilder, UniversalManifest};
///
/// let manifest = UniversalManifest::new("inedox", "InedoCore", semver::Version::new(3, 0, 0));
/// PackageBuilder::new(manifest)
///     .add_contents("publish/net452", "net452", |_| true)?
///     .add_contents("publish/net8.0", "net8.0", |_| true)?
///     .overwrite(true)
///     .write("InedoCore.upack")?;
/// # Ok::<(), inedoxpack_bundle::BundleError>(())
/// ```
#[derive(Debug)]
pub struct PackageBuilder {
    manifest: UniversalManifest,
    files: Vec<PackageFile>,
    overwrite: bool,
}

/// A file to include in the package.
#[derive(Debug)]
struct PackageFile {
    /// Path within the package archive.
    archive_path: String,
    source: FileSource,
}

#[derive(Debug)]
enum FileSource {
    Disk(PathBuf),
    Bytes(Vec<u8>),
}

impl PackageBuilder {
    /// Create a new package builder with the given manifest.
    #[must_use]
    pub fn new(manifest: UniversalManifest) -> Self {
        Self {
            manifest,
            files: Vec::new(),
            overwrite: false,
        }
    }

    /// Replace an existing file at the output path instead of failing.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Add every file under `source_dir` to `package/<target_folder>/`.
    ///
    /// An empty `target_folder` places the files directly under `package/`.
    /// `include` receives each file's path relative to `source_dir`, with `/`
    /// separators; files it rejects are skipped. Directories are walked in
    /// file-name order so archives are reproducible.
    pub fn add_contents<P, F>(
        mut self,
        source_dir: P,
        target_folder: &str,
        include: F,
    ) -> BundleResult<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> bool,
    {
        let source_dir = source_dir.as_ref();
        if !source_dir.is_dir() {
            return Err(BundleError::MissingFile(format!(
                "{} is not a directory",
                source_dir.display()
            )));
        }

        let prefix = content_prefix(target_folder);
        let mut added = 0usize;
        let mut skipped = 0usize;

        for entry in WalkDir::new(source_dir)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map(archive_relative_path)
                .map_err(|_| {
                    BundleError::MissingFile(format!(
                        "{} is outside {}",
                        entry.path().display(),
                        source_dir.display()
                    ))
                })?;

            if !include(relative.as_str()) {
                skipped += 1;
                continue;
            }

            self.files.push(PackageFile {
                archive_path: format!("{prefix}{relative}"),
                source: FileSource::Disk(entry.into_path()),
            });
            added += 1;
        }

        debug!(
            "Collected {added} files from {} ({skipped} excluded)",
            source_dir.display()
        );
        Ok(self)
    }

    /// Add raw bytes as a file in the package.
    pub fn add_bytes(mut self, archive_path: &str, contents: Vec<u8>) -> Self {
        self.files.push(PackageFile {
            archive_path: archive_path.to_string(),
            source: FileSource::Bytes(contents),
        });
        self
    }

    /// Write the package and return the SHA-256 of the written file (hex).
    pub fn write<P: AsRef<Path>>(self, output_path: P) -> BundleResult<String> {
        let output_path = output_path.as_ref();

        // Validate the manifest
        self.manifest.validate()?;

        if !self.overwrite && output_path.exists() {
            return Err(BundleError::AlreadyExists(output_path.to_path_buf()));
        }

        let directory = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(directory)?;

        let mut zip = ZipWriter::new(temp);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        // Write upack.json
        let manifest_json = self.manifest.to_json()?;
        zip.start_file(MANIFEST_FILE, options)?;
        zip.write_all(manifest_json.as_bytes())?;

        // Write all other files
        for package_file in &self.files {
            zip.start_file(package_file.archive_path.as_str(), options)?;
            match &package_file.source {
                FileSource::Disk(path) => {
                    let mut file = File::open(path)?;
                    io::copy(&mut file, &mut zip)?;
                }
                FileSource::Bytes(contents) => zip.write_all(contents)?,
            }
        }

        let temp = zip.finish()?;
        temp.as_file().sync_all()?;

        if self.overwrite {
            temp.persist(output_path).map_err(|e| e.error)?;
        } else {
            temp.persist_noclobber(output_path).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    BundleError::AlreadyExists(output_path.to_path_buf())
                } else {
                    BundleError::Io(e.error)
                }
            })?;
        }

        let digest = compute_sha256(&fs::read(output_path)?);
        debug!(
            "Wrote {} ({} files, sha256:{digest})",
            output_path.display(),
            self.files.len()
        );
        Ok(digest)
    }

    /// Archive paths of the files added so far, in insertion order.
    pub fn archive_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.archive_path.as_str())
    }
}

/// Compute SHA256 hash of data and return as hex string.
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

fn content_prefix(target_folder: &str) -> String {
    let folder = target_folder.trim_matches(['/', '\\']);
    if folder.is_empty() {
        format!("{CONTENT_DIRECTORY}/")
    } else {
        format!("{CONTENT_DIRECTORY}/{}/", folder.replace('\\', "/"))
    }
}

fn archive_relative_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

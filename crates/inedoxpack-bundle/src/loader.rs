//! Package reading utilities.
//!
//! The [`PackageReader`] opens an existing `.upack` archive, validates its
//! manifest and gives access to its entries.

use crate::{BundleError, BundleResult, CONTENT_DIRECTORY, MANIFEST_FILE, UniversalManifest};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Reader for Universal Packages.
///
/// # Example
///
/// ```no_run
/// use inedoxpack_bundle::loader::PackageReader;
///
/// let reader = PackageReader::open("InedoCore.upack")?;
/// println!("{} {}", reader.manifest().full_name(), reader.manifest().version);
/// for path in reader.content_files() {
///     println!("  {path}");
/// }
/// # Ok::<(), inedoxpack_bundle::BundleError>(())
/// ```
#[derive(Debug)]
pub struct PackageReader {
    archive: ZipArchive<File>,
    manifest: UniversalManifest,
}

impl PackageReader {
    /// Open a package file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> BundleResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        // Read and parse manifest
        let manifest = {
            let mut manifest_file = archive.by_name(MANIFEST_FILE).map_err(|_| {
                BundleError::MissingFile(format!("{MANIFEST_FILE} not found in package"))
            })?;

            let mut manifest_json = String::new();
            manifest_file.read_to_string(&mut manifest_json)?;
            UniversalManifest::from_json(&manifest_json)?
        };

        // Validate manifest
        manifest.validate()?;

        Ok(Self { archive, manifest })
    }

    /// Get the package manifest.
    #[must_use]
    pub fn manifest(&self) -> &UniversalManifest {
        &self.manifest
    }

    /// Read a file from the package as bytes.
    pub fn read_file(&mut self, path: &str) -> BundleResult<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|_| BundleError::MissingFile(format!("File not found in package: {path}")))?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(contents)
    }

    /// List all files in the package.
    #[must_use]
    pub fn list_files(&self) -> Vec<String> {
        (0..self.archive.len())
            .filter_map(|i| self.archive.name_for_index(i).map(String::from))
            .collect()
    }

    /// List the content files, relative to `package/`.
    #[must_use]
    pub fn content_files(&self) -> Vec<String> {
        let prefix = format!("{CONTENT_DIRECTORY}/");
        self.list_files()
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(String::from))
            .filter(|name| !name.is_empty() && !name.ends_with('/'))
            .collect()
    }

    /// Check if a file exists in the package.
    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.archive.index_for_name(path).is_some()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::PackageBuilder;
    use semver::Version;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_package(temp_dir: &TempDir) -> PathBuf {
        let package_path = temp_dir.path().join("Sample.upack");

        let mut manifest = UniversalManifest::new("inedox", "Sample", Version::new(1, 2, 0));
        manifest.set_property("_targetFrameworks", vec!["net8.0"]);
        PackageBuilder::new(manifest)
            .add_bytes("package/Sample.dll", b"module".to_vec())
            .add_bytes("package/Sample.deps.json", b"{}".to_vec())
            .write(&package_path)
            .unwrap();

        package_path
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn PackageReader___open___reads_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let package_path = create_test_package(&temp_dir);

        let reader = PackageReader::open(&package_path).unwrap();

        assert_eq!(reader.manifest().name, "Sample");
        assert_eq!(reader.manifest().version, Version::new(1, 2, 0));
        assert!(reader.manifest().property("_targetFrameworks").is_some());
    }

    #[test]
    fn PackageReader___open___nonexistent_file___returns_error() {
        let result = PackageReader::open("/nonexistent/package.upack");

        assert!(matches!(result, Err(BundleError::Io(_))));
    }

    #[test]
    fn PackageReader___open___not_a_zip___returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let fake = temp_dir.path().join("fake.upack");
        std::fs::write(&fake, b"not a zip file").unwrap();

        let result = PackageReader::open(&fake);

        assert!(matches!(result, Err(BundleError::Zip(_))));
    }

    #[test]
    fn PackageReader___open___missing_manifest___returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no-manifest.upack");
        write_zip(&path, &[("package/some-file.txt", b"content")]);

        let err = PackageReader::open(&path).unwrap_err();

        assert!(matches!(err, BundleError::MissingFile(_)));
        assert!(err.to_string().contains("upack.json"));
    }

    #[test]
    fn PackageReader___open___invalid_manifest_json___returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad-manifest.upack");
        write_zip(&path, &[("upack.json", b"{ invalid json }")]);

        let result = PackageReader::open(&path);

        assert!(matches!(result, Err(BundleError::Json(_))));
    }

    #[test]
    fn PackageReader___open___invalid_manifest_name___returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad-name.upack");
        write_zip(
            &path,
            &[("upack.json", br#"{"name":"has space","version":"1.0.0"}"#)],
        );

        let result = PackageReader::open(&path);

        assert!(matches!(result, Err(BundleError::InvalidManifest(_))));
    }

    #[test]
    fn PackageReader___content_files___strips_package_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let package_path = create_test_package(&temp_dir);

        let reader = PackageReader::open(&package_path).unwrap();

        assert_eq!(
            reader.content_files(),
            vec!["Sample.dll".to_string(), "Sample.deps.json".to_string()]
        );
        assert!(reader.list_files().contains(&"upack.json".to_string()));
    }

    #[test]
    fn PackageReader___read_file___returns_contents() {
        let temp_dir = TempDir::new().unwrap();
        let package_path = create_test_package(&temp_dir);
        let mut reader = PackageReader::open(&package_path).unwrap();

        assert_eq!(reader.read_file("package/Sample.dll").unwrap(), b"module");
        assert!(matches!(
            reader.read_file("package/missing.dll"),
            Err(BundleError::MissingFile(_))
        ));
    }

    #[test]
    fn PackageReader___has_file___checks_presence() {
        let temp_dir = TempDir::new().unwrap();
        let package_path = create_test_package(&temp_dir);

        let reader = PackageReader::open(&package_path).unwrap();

        assert!(reader.has_file("upack.json"));
        assert!(!reader.has_file("manifest.json"));
    }
}

//! Extension identity extraction.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::attribute::{decode_applies_to, decode_string_argument};
use crate::metadata::Metadata;
use crate::module::{AssemblyAttribute, ModuleDefinition};
use crate::pe::PeImage;
use crate::{AssemblyError, AssemblyResult, AssemblyVersion, HostProducts, TargetPlatform};

/// Name of the host SDK assembly every extension references.
pub const HOST_SDK_ASSEMBLY: &str = "Inedo.SDK";

const TARGET_FRAMEWORK_ATTRIBUTE: &str = "System.Runtime.Versioning.TargetFrameworkAttribute";
const EXTENSION_ICON_ATTRIBUTE: &str = "Inedo.Extensibility.ExtensionIconAttribute";
const APPLIES_TO_ATTRIBUTE: &str = "Inedo.Extensibility.AppliesToAttribute";
const TITLE_ATTRIBUTE: &str = "System.Reflection.AssemblyTitleAttribute";
const DESCRIPTION_ATTRIBUTE: &str = "System.Reflection.AssemblyDescriptionAttribute";

/// Identity of one build of an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    /// Directory holding the module file.
    pub containing_path: PathBuf,

    /// Assembly simple name.
    pub name: String,

    /// Assembly version.
    pub version: AssemblyVersion,

    /// Version of the referenced `Inedo.SDK` assembly.
    pub sdk_version: AssemblyVersion,

    /// Framework the module was compiled for.
    pub target_platform: TargetPlatform,

    /// Host products declared by `AppliesToAttribute`.
    pub products: HostProducts,

    pub title: Option<String>,

    pub description: Option<String>,

    pub icon_url: Option<String>,
}

impl PluginMetadata {
    /// Inspect a module file.
    ///
    /// Returns `Ok(None)` when the file is not an extension: it is not a PE
    /// image, carries no CLI metadata, or does not reference `Inedo.SDK`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::MalformedPlugin`] when the module references
    /// the SDK but its manifest or attributes cannot be decoded, or its
    /// target framework is missing or unsupported. Failures before the SDK
    /// reference is found surface as I/O or metadata errors.
    pub fn read(path: impl AsRef<Path>) -> AssemblyResult<Option<Self>> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::from_image(path, &data)
    }

    /// Inspect an in-memory module image. `path` is only used for
    /// `containing_path` and error messages.
    pub fn from_image(path: &Path, data: &[u8]) -> AssemblyResult<Option<Self>> {
        let image = match PeImage::parse(data) {
            Ok(image) => image,
            Err(AssemblyError::InvalidImage(reason)) => {
                debug!("Skipping {}: {reason}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(root) = image.cli_metadata()? else {
            debug!("Skipping {}: native image", path.display());
            return Ok(None);
        };

        let module = ModuleDefinition::new(Metadata::parse(root)?);

        let Some(sdk) = module
            .references()?
            .into_iter()
            .find(|r| r.name == HOST_SDK_ASSEMBLY)
        else {
            trace!("Skipping {}: no {HOST_SDK_ASSEMBLY} reference", path.display());
            return Ok(None);
        };

        // past this point the module claims to be an extension, so any
        // decoding failure is fatal rather than a reason to skip it
        let metadata = Self::describe(path, &module, sdk.version).map_err(|e| match e {
            AssemblyError::MalformedPlugin { .. } | AssemblyError::Io(_) => e,
            other => malformed(path, other.to_string()),
        })?;

        debug!(
            "Read {} {} ({}) from {}",
            metadata.name,
            metadata.version,
            metadata.target_platform,
            path.display()
        );
        Ok(Some(metadata))
    }

    fn describe(
        path: &Path,
        module: &ModuleDefinition<'_>,
        sdk_version: AssemblyVersion,
    ) -> AssemblyResult<Self> {
        let Some(assembly) = module.assembly()? else {
            return Err(malformed(path, "module has no assembly manifest"));
        };

        let attributes = module.assembly_attributes()?;

        let framework = string_attribute(&attributes, TARGET_FRAMEWORK_ATTRIBUTE)?;
        let target_platform = match framework.as_deref() {
            Some(framework) => TargetPlatform::from_framework_name(framework).ok_or_else(|| {
                malformed(path, format!("unsupported target framework '{framework}'"))
            })?,
            None => return Err(malformed(path, "missing TargetFrameworkAttribute")),
        };

        let products = match find_attribute(&attributes, APPLIES_TO_ATTRIBUTE) {
            Some(attribute) => decode_applies_to(attribute.value).ok_or_else(|| {
                malformed(
                    path,
                    format!(
                        "AppliesToAttribute value is {} bytes, expected at least 6",
                        attribute.value.len()
                    ),
                )
            })?,
            None => HostProducts::UNSPECIFIED,
        };

        Ok(Self {
            containing_path: containing_path(path),
            name: assembly.name.to_string(),
            version: assembly.version,
            sdk_version,
            target_platform,
            products,
            title: string_attribute(&attributes, TITLE_ATTRIBUTE)?,
            description: string_attribute(&attributes, DESCRIPTION_ATTRIBUTE)?,
            icon_url: string_attribute(&attributes, EXTENSION_ICON_ATTRIBUTE)?,
        })
    }
}

/// First attribute of the given type; later duplicates are ignored.
fn find_attribute<'m, 'a>(
    attributes: &'m [AssemblyAttribute<'a>],
    type_name: &str,
) -> Option<&'m AssemblyAttribute<'a>> {
    attributes.iter().find(|a| a.type_name == type_name)
}

fn string_attribute(
    attributes: &[AssemblyAttribute<'_>],
    type_name: &str,
) -> AssemblyResult<Option<String>> {
    match find_attribute(attributes, type_name) {
        Some(attribute) => decode_string_argument(attribute.value),
        None => Ok(None),
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> AssemblyError {
    AssemblyError::MalformedPlugin {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn containing_path(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

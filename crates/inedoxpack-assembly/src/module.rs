//! Assembly-level queries over the metadata tables.

use crate::metadata::{CodedIndex, Metadata, table};
use crate::{AssemblyError, AssemblyResult, AssemblyVersion};

/// Name and version of an assembly definition or reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssemblyIdentity<'a> {
    pub(crate) name: &'a str,
    pub(crate) version: AssemblyVersion,
}

/// A custom attribute attached to the assembly definition.
#[derive(Debug, Clone)]
pub(crate) struct AssemblyAttribute<'a> {
    /// Full name of the attribute type, e.g. `System.Reflection.AssemblyTitleAttribute`.
    pub(crate) type_name: String,
    /// Raw encoded value (prolog, fixed arguments, named arguments).
    pub(crate) value: &'a [u8],
}

/// Read-only view of a module's manifest tables.
pub(crate) struct ModuleDefinition<'a> {
    metadata: Metadata<'a>,
}

impl<'a> ModuleDefinition<'a> {
    pub(crate) fn new(metadata: Metadata<'a>) -> Self {
        Self { metadata }
    }

    /// The module's own assembly definition, if it is not a bare netmodule.
    pub(crate) fn assembly(&self) -> AssemblyResult<Option<AssemblyIdentity<'a>>> {
        let tables = self.metadata.tables();
        if tables.row_count(table::ASSEMBLY) == 0 {
            return Ok(None);
        }
        let row = tables.row(table::ASSEMBLY, 1)?;
        Ok(Some(AssemblyIdentity {
            name: self.metadata.string(row.get(7)?)?,
            version: version_from_columns(row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?),
        }))
    }

    /// Every row of the `AssemblyRef` table.
    pub(crate) fn references(&self) -> AssemblyResult<Vec<AssemblyIdentity<'a>>> {
        self.metadata
            .tables()
            .rows(table::ASSEMBLY_REF)
            .map(|row| {
                let row = row?;
                Ok(AssemblyIdentity {
                    name: self.metadata.string(row.get(6)?)?,
                    version: version_from_columns(
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ),
                })
            })
            .collect()
    }

    /// Custom attributes whose parent is the assembly definition.
    pub(crate) fn assembly_attributes(&self) -> AssemblyResult<Vec<AssemblyAttribute<'a>>> {
        let mut attributes = Vec::new();
        for row in self.metadata.tables().rows(table::CUSTOM_ATTRIBUTE) {
            let row = row?;
            match CodedIndex::HasCustomAttribute.decode(row.get(0)?) {
                Some((table::ASSEMBLY, _)) => {}
                _ => continue,
            }

            let type_name = self.attribute_type_name(row.get(1)?)?;
            attributes.push(AssemblyAttribute {
                type_name,
                value: self.metadata.blob(row.get(2)?)?,
            });
        }
        Ok(attributes)
    }

    /// Resolve a `CustomAttributeType` to the full name of the declaring type.
    fn attribute_type_name(&self, constructor: u32) -> AssemblyResult<String> {
        let tables = self.metadata.tables();
        match CodedIndex::CustomAttributeType.decode(constructor) {
            Some((table::MEMBER_REF, rid)) => {
                let member = tables.row(table::MEMBER_REF, rid)?;
                match CodedIndex::MemberRefParent.decode(member.get(0)?) {
                    Some((table::TYPE_REF, rid)) => self.type_ref_name(rid),
                    Some((table::TYPE_DEF, rid)) => self.type_def_name(rid),
                    // vararg call sites and generic instantiations are never attribute types
                    _ => Ok(String::new()),
                }
            }
            Some((table::METHOD_DEF, rid)) => {
                let owner = self.method_owner(rid)?;
                self.type_def_name(owner)
            }
            _ => Err(AssemblyError::MalformedMetadata(format!(
                "invalid custom attribute constructor {constructor:#x}"
            ))),
        }
    }

    fn type_ref_name(&self, rid: u32) -> AssemblyResult<String> {
        let row = self.metadata.tables().row(table::TYPE_REF, rid)?;
        Ok(full_name(
            self.metadata.string(row.get(2)?)?,
            self.metadata.string(row.get(1)?)?,
        ))
    }

    fn type_def_name(&self, rid: u32) -> AssemblyResult<String> {
        let row = self.metadata.tables().row(table::TYPE_DEF, rid)?;
        Ok(full_name(
            self.metadata.string(row.get(2)?)?,
            self.metadata.string(row.get(1)?)?,
        ))
    }

    /// Find the `TypeDef` whose method list contains `method`.
    ///
    /// Method lists are contiguous and ascending, so the owner is the last
    /// type whose list starts at or before the method.
    fn method_owner(&self, method: u32) -> AssemblyResult<u32> {
        let mut owner = None;
        for (index, row) in self.metadata.tables().rows(table::TYPE_DEF).enumerate() {
            if row?.get(5)? <= method {
                owner = Some(index as u32 + 1);
            } else {
                break;
            }
        }
        owner.ok_or_else(|| {
            AssemblyError::MalformedMetadata(format!("method {method} has no declaring type"))
        })
    }
}

fn full_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

fn version_from_columns(major: u32, minor: u32, build: u32, revision: u32) -> AssemblyVersion {
    // Columns are 2 bytes wide, so the truncating casts are lossless.
    AssemblyVersion::new(major as u16, minor as u16, build as u16, revision as u16)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::fixture::ModuleBuilder;
    use crate::pe::PeImage;

    fn with_module<T>(data: &[u8], f: impl FnOnce(&ModuleDefinition<'_>) -> T) -> T {
        let image = PeImage::parse(data).unwrap();
        let root = image.cli_metadata().unwrap().unwrap();
        let module = ModuleDefinition::new(Metadata::parse(root).unwrap());
        f(&module)
    }

    #[test]
    fn ModuleDefinition___assembly___reads_name_and_version() {
        let data = ModuleBuilder::new("Inedo.Extensions.Git")
            .version(3, 1, 4, 0)
            .build();

        let (name, version) = with_module(&data, |module| {
            let identity = module.assembly().unwrap().unwrap();
            (identity.name.to_string(), identity.version)
        });

        assert_eq!(name, "Inedo.Extensions.Git");
        assert_eq!(version, AssemblyVersion::new(3, 1, 4, 0));
    }

    #[test]
    fn ModuleDefinition___references___lists_every_assembly_ref() {
        let data = ModuleBuilder::new("Sample")
            .reference("Newtonsoft.Json", [13, 0, 0, 0])
            .sdk_reference(2, 4, 1)
            .build();

        let names = with_module(&data, |module| {
            module
                .references()
                .unwrap()
                .iter()
                .map(|r| r.name.to_string())
                .collect::<Vec<_>>()
        });

        assert_eq!(names, vec!["System.Runtime", "Newtonsoft.Json", "Inedo.SDK"]);
    }

    #[test]
    fn ModuleDefinition___assembly_attributes___resolves_type_ref_names() {
        let data = ModuleBuilder::new("Sample")
            .title("Sample Title")
            .description("Sample Description")
            .build();

        let names = with_module(&data, |module| {
            module
                .assembly_attributes()
                .unwrap()
                .into_iter()
                .map(|a| a.type_name)
                .collect::<Vec<_>>()
        });

        assert!(names.contains(&"System.Reflection.AssemblyTitleAttribute".to_string()));
        assert!(names.contains(&"System.Reflection.AssemblyDescriptionAttribute".to_string()));
    }

    #[test]
    fn ModuleDefinition___assembly_attributes___resolves_locally_defined_types() {
        let data = ModuleBuilder::new("Sample")
            .local_attribute("Sample.Internal", "MarkerAttribute", vec![1, 0, 0, 0])
            .local_attribute("Sample.Internal", "OtherAttribute", vec![1, 0, 0, 0])
            .build();

        let names = with_module(&data, |module| {
            module
                .assembly_attributes()
                .unwrap()
                .into_iter()
                .map(|a| a.type_name)
                .collect::<Vec<_>>()
        });

        assert_eq!(
            names,
            vec![
                "Sample.Internal.MarkerAttribute".to_string(),
                "Sample.Internal.OtherAttribute".to_string()
            ]
        );
    }

    #[test]
    fn full_name___empty_namespace___returns_bare_name() {
        assert_eq!(full_name("", "Attr"), "Attr");
        assert_eq!(full_name("A.B", "Attr"), "A.B.Attr");
    }
}

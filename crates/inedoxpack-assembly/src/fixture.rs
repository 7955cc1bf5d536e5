//! Synthetic assemblies for tests.
//!
//! [`ModuleBuilder`] emits a small but well-formed PE image: one `.text`
//! section holding the CLI header and an ECMA-335 metadata root with only
//! the tables the extractor reads (`Module`, `TypeRef`, `TypeDef`,
//! `MethodDef`, `MemberRef`, `CustomAttribute`, `Assembly`, `AssemblyRef`).
//! Header fields the reader ignores are left zero.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::metadata::{CodedIndex, table};
use crate::{HOST_SDK_ASSEMBLY, MODULE_EXTENSION, TargetPlatform};

const PE_HEADER_OFFSET: usize = 0x80;
const FILE_ALIGNMENT: usize = 0x200;
const TEXT_RVA: u32 = 0x2000;
const CLI_HEADER_SIZE: u32 = 72;
const DIRECTORY_COUNT: usize = 16;
const CLI_HEADER_DIRECTORY: usize = 14;
const RUNTIME_VERSION: &str = "v4.0.30319";

/// Default `AssemblyRef` every builder starts with.
const CORE_LIBRARY: (&str, [u16; 4]) = ("System.Runtime", [8, 0, 0, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Assembly,
    Module,
}

#[derive(Debug, Clone)]
struct Attribute {
    namespace: String,
    name: String,
    value: Vec<u8>,
    local: bool,
    owner: Owner,
}

/// Builder for synthetic managed modules.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    name: String,
    version: [u16; 4],
    references: Vec<(String, [u16; 4])>,
    attributes: Vec<Attribute>,
    pe32_plus: bool,
    wide_heaps: bool,
}

impl ModuleBuilder {
    /// A module named `name`, version 1.0.0.0, referencing only `System.Runtime`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: [1, 0, 0, 0],
            references: vec![(CORE_LIBRARY.0.to_string(), CORE_LIBRARY.1)],
            attributes: Vec::new(),
            pe32_plus: false,
            wide_heaps: false,
        }
    }

    /// A minimal extension: references `Inedo.SDK` 3.0.0 and declares `platform`.
    pub fn plugin(name: &str, platform: TargetPlatform) -> Self {
        Self::new(name)
            .sdk_reference(3, 0, 0)
            .target_framework(platform.framework_name())
    }

    pub fn version(mut self, major: u16, minor: u16, build: u16, revision: u16) -> Self {
        self.version = [major, minor, build, revision];
        self
    }

    /// Add an `AssemblyRef` row.
    pub fn reference(mut self, name: &str, version: [u16; 4]) -> Self {
        self.references.push((name.to_string(), version));
        self
    }

    /// Reference the host SDK.
    pub fn sdk_reference(self, major: u16, minor: u16, build: u16) -> Self {
        self.reference(HOST_SDK_ASSEMBLY, [major, minor, build, 0])
    }

    pub fn target_framework(self, framework: &str) -> Self {
        self.string_attribute(
            "System.Runtime.Versioning",
            "TargetFrameworkAttribute",
            Some(framework),
        )
    }

    pub fn title(self, title: &str) -> Self {
        self.string_attribute("System.Reflection", "AssemblyTitleAttribute", Some(title))
    }

    pub fn description(self, description: &str) -> Self {
        self.string_attribute(
            "System.Reflection",
            "AssemblyDescriptionAttribute",
            Some(description),
        )
    }

    pub fn icon_url(self, url: &str) -> Self {
        self.string_attribute("Inedo.Extensibility", "ExtensionIconAttribute", Some(url))
    }

    /// Declare supported products as the raw flag value.
    pub fn applies_to(self, products: i32) -> Self {
        let mut value = vec![0x01, 0x00];
        value.extend_from_slice(&products.to_le_bytes());
        value.extend_from_slice(&[0x00, 0x00]);
        self.raw_attribute("Inedo.Extensibility", "AppliesToAttribute", value)
    }

    /// Attach an attribute whose constructor takes one `string` (`None` encodes null).
    pub fn string_attribute(self, namespace: &str, name: &str, value: Option<&str>) -> Self {
        self.raw_attribute(namespace, name, string_blob(value))
    }

    /// Attach an assembly attribute defined in another assembly, with an arbitrary value blob.
    pub fn raw_attribute(mut self, namespace: &str, name: &str, value: Vec<u8>) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.to_string(),
            name: name.to_string(),
            value,
            local: false,
            owner: Owner::Assembly,
        });
        self
    }

    /// Attach an assembly attribute whose type is defined in this module.
    pub fn local_attribute(mut self, namespace: &str, name: &str, value: Vec<u8>) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.to_string(),
            name: name.to_string(),
            value,
            local: true,
            owner: Owner::Assembly,
        });
        self
    }

    /// Attach a string attribute to the module row instead of the assembly.
    pub fn module_attribute(mut self, namespace: &str, name: &str, value: Option<&str>) -> Self {
        self.attributes.push(Attribute {
            namespace: namespace.to_string(),
            name: name.to_string(),
            value: string_blob(value),
            local: false,
            owner: Owner::Module,
        });
        self
    }

    /// Emit a PE32+ optional header.
    pub fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    /// Use 4-byte indexes for every heap.
    pub fn wide_heaps(mut self) -> Self {
        self.wide_heaps = true;
        self
    }

    /// Write `<dir>/<name>.dll` and return its path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let path = dir
            .as_ref()
            .join(format!("{}.{MODULE_EXTENSION}", self.name));
        fs::write(&path, self.build())?;
        Ok(path)
    }

    pub fn build(&self) -> Vec<u8> {
        let metadata = self.metadata_root();

        let mut text = Buf::default();
        text.u32(CLI_HEADER_SIZE);
        text.u16(2); // runtime major
        text.u16(5); // runtime minor
        text.u32(TEXT_RVA + CLI_HEADER_SIZE);
        text.u32(metadata.len() as u32);
        text.u32(0x1); // ILONLY
        text.u32(0); // entry point token
        text.zeros(48); // resources .. managed native header
        text.bytes(&metadata);

        pe_image(
            &text.0,
            Some((TEXT_RVA, CLI_HEADER_SIZE)),
            self.pe32_plus,
        )
    }

    fn metadata_root(&self) -> Vec<u8> {
        let mut heaps = Heaps::new(self.wide_heaps);
        let tables = self.table_stream(&mut heaps);

        let streams = [
            ("#~", tables),
            ("#Strings", heaps.strings),
            ("#US", vec![0]),
            ("#GUID", heaps.guids),
            ("#Blob", heaps.blobs),
        ];

        let mut version = RUNTIME_VERSION.as_bytes().to_vec();
        version.push(0);
        pad(&mut version, 4);

        let headers_len: usize = streams
            .iter()
            .map(|(name, _)| 8 + padded_len(name.len() + 1))
            .sum();
        let mut offset = 16 + version.len() + 4 + headers_len;

        let mut root = Buf::default();
        root.u32(0x424A_5342);
        root.u16(1);
        root.u16(1);
        root.u32(0);
        root.u32(version.len() as u32);
        root.bytes(&version);
        root.u16(0);
        root.u16(streams.len() as u16);

        let mut bodies = Buf::default();
        for (name, body) in streams {
            let mut body = body;
            pad(&mut body, 4);
            root.u32(offset as u32);
            root.u32(body.len() as u32);
            let mut name = name.as_bytes().to_vec();
            name.push(0);
            pad(&mut name, 4);
            root.bytes(&name);
            offset += body.len();
            bodies.bytes(&body);
        }
        root.bytes(&bodies.0);
        root.0
    }

    fn table_stream(&self, heaps: &mut Heaps) -> Vec<u8> {
        let wide = heaps.wide;
        let mut tables: BTreeMap<usize, TableData> = BTreeMap::new();

        let module_name = heaps.string(&format!("{}.{MODULE_EXTENSION}", self.name));
        let mvid = heaps.guid(&self.name);
        let r = row(&mut tables, table::MODULE);
        r.u16(0);
        r.index(module_name, wide);
        r.index(mvid, wide);
        r.index(0, wide);
        r.index(0, wide);

        let module_type = heaps.string("<Module>");
        let r = row(&mut tables, table::TYPE_DEF);
        r.u32(0);
        r.index(module_type, wide);
        r.index(0, wide);
        r.u16(0); // extends
        r.u16(1); // field list
        r.u16(1); // method list

        let ctor_name = heaps.string(".ctor");
        let ctor_signature = heaps.blob(&[0x20, 0x00, 0x01]); // instance void ()
        let scope = coded(CodedIndex::ResolutionScope, table::ASSEMBLY_REF, 1);

        let (mut type_refs, mut member_refs, mut methods) = (0, 0, 0);
        for attribute in &self.attributes {
            let name = heaps.string(&attribute.name);
            let namespace = heaps.string(&attribute.namespace);

            let constructor = if attribute.local {
                methods += 1;
                let r = row(&mut tables, table::TYPE_DEF);
                r.u32(0x0010_0001); // public, beforefieldinit
                r.index(name, wide);
                r.index(namespace, wide);
                r.u16(0);
                r.u16(1);
                r.u16(methods as u16);

                let r = row(&mut tables, table::METHOD_DEF);
                r.u32(0);
                r.u16(0);
                r.u16(0x1886); // public, hidebysig, specialname, rtspecialname
                r.index(ctor_name, wide);
                r.index(ctor_signature, wide);
                r.u16(1);

                coded(CodedIndex::CustomAttributeType, table::METHOD_DEF, methods)
            } else {
                type_refs += 1;
                let r = row(&mut tables, table::TYPE_REF);
                r.u16(scope as u16);
                r.index(name, wide);
                r.index(namespace, wide);

                member_refs += 1;
                let parent = coded(CodedIndex::MemberRefParent, table::TYPE_REF, type_refs);
                let r = row(&mut tables, table::MEMBER_REF);
                r.u16(parent as u16);
                r.index(ctor_name, wide);
                r.index(ctor_signature, wide);

                coded(CodedIndex::CustomAttributeType, table::MEMBER_REF, member_refs)
            };

            let parent = match attribute.owner {
                Owner::Assembly => coded(CodedIndex::HasCustomAttribute, table::ASSEMBLY, 1),
                Owner::Module => coded(CodedIndex::HasCustomAttribute, table::MODULE, 1),
            };
            let value = heaps.blob(&attribute.value);
            let r = row(&mut tables, table::CUSTOM_ATTRIBUTE);
            r.u16(parent as u16);
            r.u16(constructor as u16);
            r.index(value, wide);
        }

        let assembly_name = heaps.string(&self.name);
        let r = row(&mut tables, table::ASSEMBLY);
        r.u32(0x8004); // SHA1
        for component in self.version {
            r.u16(component);
        }
        r.u32(0);
        r.index(0, wide);
        r.index(assembly_name, wide);
        r.index(0, wide);

        for (name, version) in &self.references {
            let name = heaps.string(name);
            let r = row(&mut tables, table::ASSEMBLY_REF);
            for component in version {
                r.u16(*component);
            }
            r.u32(0);
            r.index(0, wide);
            r.index(name, wide);
            r.index(0, wide);
            r.index(0, wide);
        }

        let mut stream = Buf::default();
        stream.u32(0);
        stream.u8(2);
        stream.u8(0);
        stream.u8(if wide { 0x07 } else { 0x00 });
        stream.u8(1);
        stream.u64(tables.keys().fold(0, |valid, id| valid | 1 << id));
        stream.u64(0);
        for data in tables.values() {
            stream.u32(data.rows);
        }
        for data in tables.values() {
            stream.bytes(&data.bytes.0);
        }
        stream.0
    }
}

/// A PE32 DLL with a `.text` section and no CLI header.
pub fn native_image() -> Vec<u8> {
    pe_image(&[0xC3; 16], None, false)
}

fn pe_image(text: &[u8], cli_header: Option<(u32, u32)>, pe32_plus: bool) -> Vec<u8> {
    let mut b = Buf::default();
    b.u16(0x5A4D);
    b.zeros(0x3C - 2);
    b.u32(PE_HEADER_OFFSET as u32);
    b.zeros(PE_HEADER_OFFSET - 0x40);

    b.u32(0x0000_4550);
    b.u16(if pe32_plus { 0x8664 } else { 0x014C });
    b.u16(1); // sections
    b.zeros(12);
    b.u16(if pe32_plus { 240 } else { 224 });
    b.u16(0x2022); // executable, large address aware, DLL

    let (magic, directory_count_offset) = if pe32_plus {
        (0x020B, 108)
    } else {
        (0x010B, 92)
    };
    b.u16(magic);
    b.zeros(directory_count_offset - 2);
    b.u32(DIRECTORY_COUNT as u32);
    for index in 0..DIRECTORY_COUNT {
        match cli_header {
            Some((rva, size)) if index == CLI_HEADER_DIRECTORY => {
                b.u32(rva);
                b.u32(size);
            }
            _ => b.zeros(8),
        }
    }

    b.bytes(b".text\0\0\0");
    b.u32(text.len() as u32);
    b.u32(TEXT_RVA);
    b.u32(padded_len_to(text.len(), FILE_ALIGNMENT) as u32);
    b.u32(FILE_ALIGNMENT as u32);
    b.zeros(12);
    b.u32(0x6000_0020); // code, execute, read

    pad(&mut b.0, FILE_ALIGNMENT);
    b.bytes(text);
    pad(&mut b.0, FILE_ALIGNMENT);
    b.0
}

fn string_blob(value: Option<&str>) -> Vec<u8> {
    let mut blob = vec![0x01, 0x00];
    match value {
        Some(value) => {
            blob.extend(compressed(value.len()));
            blob.extend_from_slice(value.as_bytes());
        }
        None => blob.push(0xFF),
    }
    blob.extend_from_slice(&[0x00, 0x00]);
    blob
}

#[allow(clippy::expect_used)] // Safe: every call site passes a member table of the index
fn coded(kind: CodedIndex, table: usize, row: u32) -> u32 {
    kind.encode(table, row)
        .expect("table is addressable by the coded index")
}

fn compressed(value: usize) -> Vec<u8> {
    match value {
        0..0x80 => vec![value as u8],
        0x80..0x4000 => vec![0x80 | (value >> 8) as u8, value as u8],
        _ => {
            let v = value as u32 | 0xC000_0000;
            v.to_be_bytes().to_vec()
        }
    }
}

fn padded_len(len: usize) -> usize {
    padded_len_to(len, 4)
}

fn padded_len_to(len: usize, alignment: usize) -> usize {
    len.div_ceil(alignment) * alignment
}

fn pad(bytes: &mut Vec<u8>, alignment: usize) {
    bytes.resize(padded_len_to(bytes.len(), alignment), 0);
}

#[derive(Debug, Default)]
struct TableData {
    rows: u32,
    bytes: Buf,
}

fn row(tables: &mut BTreeMap<usize, TableData>, table: usize) -> &mut Buf {
    let data = tables.entry(table).or_default();
    data.rows += 1;
    &mut data.bytes
}

#[derive(Debug)]
struct Heaps {
    strings: Vec<u8>,
    blobs: Vec<u8>,
    guids: Vec<u8>,
    wide: bool,
}

impl Heaps {
    fn new(wide: bool) -> Self {
        Self {
            strings: vec![0],
            blobs: vec![0],
            guids: Vec::new(),
            wide,
        }
    }

    fn string(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        let index = self.strings.len() as u32;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        index
    }

    fn blob(&mut self, value: &[u8]) -> u32 {
        if value.is_empty() {
            return 0;
        }
        let index = self.blobs.len() as u32;
        self.blobs.extend(compressed(value.len()));
        self.blobs.extend_from_slice(value);
        index
    }

    /// Append a GUID derived from `seed`; GUID indexes are 1-based.
    fn guid(&mut self, seed: &str) -> u32 {
        let mut guid = [0u8; 16];
        for (slot, byte) in guid.iter_mut().zip(seed.bytes().cycle()) {
            *slot = byte;
        }
        self.guids.extend_from_slice(&guid);
        (self.guids.len() / 16) as u32
    }
}

#[derive(Debug, Default)]
struct Buf(Vec<u8>);

impl Buf {
    fn u8(&mut self, value: u8) {
        self.0.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn index(&mut self, value: u32, wide: bool) {
        if wide {
            self.u32(value);
        } else {
            self.u16(value as u16);
        }
    }

    fn bytes(&mut self, value: &[u8]) {
        self.0.extend_from_slice(value);
    }

    fn zeros(&mut self, count: usize) {
        self.0.resize(self.0.len() + count, 0);
    }
}

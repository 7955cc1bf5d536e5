//! The `#~` table stream: row counts, column layouts and coded indexes
//! (Partition II, 22 and 24.2.6).
//!
//! Every table up to `GenericParamConstraint` is described so that row sizes
//! can be computed exactly, even for tables this crate never reads.

use crate::reader::ByteReader;
use crate::{AssemblyError, AssemblyResult};

/// Number of table identifiers valid in an assembly (0x00..=0x2C).
pub(crate) const TABLE_COUNT: usize = 0x2D;

const WIDE_STRINGS: u8 = 0x01;
const WIDE_GUIDS: u8 = 0x02;
const WIDE_BLOBS: u8 = 0x04;
const EXTRA_DATA: u8 = 0x40;

/// Table identifiers.
pub(crate) mod table {
    pub(crate) const MODULE: usize = 0x00;
    pub(crate) const TYPE_REF: usize = 0x01;
    pub(crate) const TYPE_DEF: usize = 0x02;
    pub(crate) const FIELD_PTR: usize = 0x03;
    pub(crate) const FIELD: usize = 0x04;
    pub(crate) const METHOD_PTR: usize = 0x05;
    pub(crate) const METHOD_DEF: usize = 0x06;
    pub(crate) const PARAM_PTR: usize = 0x07;
    pub(crate) const PARAM: usize = 0x08;
    pub(crate) const INTERFACE_IMPL: usize = 0x09;
    pub(crate) const MEMBER_REF: usize = 0x0A;
    pub(crate) const CONSTANT: usize = 0x0B;
    pub(crate) const CUSTOM_ATTRIBUTE: usize = 0x0C;
    pub(crate) const FIELD_MARSHAL: usize = 0x0D;
    pub(crate) const DECL_SECURITY: usize = 0x0E;
    pub(crate) const CLASS_LAYOUT: usize = 0x0F;
    pub(crate) const FIELD_LAYOUT: usize = 0x10;
    pub(crate) const STAND_ALONE_SIG: usize = 0x11;
    pub(crate) const EVENT_MAP: usize = 0x12;
    pub(crate) const EVENT_PTR: usize = 0x13;
    pub(crate) const EVENT: usize = 0x14;
    pub(crate) const PROPERTY_MAP: usize = 0x15;
    pub(crate) const PROPERTY_PTR: usize = 0x16;
    pub(crate) const PROPERTY: usize = 0x17;
    pub(crate) const METHOD_SEMANTICS: usize = 0x18;
    pub(crate) const METHOD_IMPL: usize = 0x19;
    pub(crate) const MODULE_REF: usize = 0x1A;
    pub(crate) const TYPE_SPEC: usize = 0x1B;
    pub(crate) const IMPL_MAP: usize = 0x1C;
    pub(crate) const FIELD_RVA: usize = 0x1D;
    pub(crate) const ENC_LOG: usize = 0x1E;
    pub(crate) const ENC_MAP: usize = 0x1F;
    pub(crate) const ASSEMBLY: usize = 0x20;
    pub(crate) const ASSEMBLY_PROCESSOR: usize = 0x21;
    pub(crate) const ASSEMBLY_OS: usize = 0x22;
    pub(crate) const ASSEMBLY_REF: usize = 0x23;
    pub(crate) const ASSEMBLY_REF_PROCESSOR: usize = 0x24;
    pub(crate) const ASSEMBLY_REF_OS: usize = 0x25;
    pub(crate) const FILE: usize = 0x26;
    pub(crate) const EXPORTED_TYPE: usize = 0x27;
    pub(crate) const MANIFEST_RESOURCE: usize = 0x28;
    pub(crate) const NESTED_CLASS: usize = 0x29;
    pub(crate) const GENERIC_PARAM: usize = 0x2A;
    pub(crate) const METHOD_SPEC: usize = 0x2B;
    pub(crate) const GENERIC_PARAM_CONSTRAINT: usize = 0x2C;
}

use table::*;

/// Coded index kinds (II.24.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndex {
    /// Tables addressed by each tag value; `None` marks unused tags.
    fn tables(self) -> &'static [Option<usize>] {
        match self {
            Self::TypeDefOrRef => &[Some(TYPE_DEF), Some(TYPE_REF), Some(TYPE_SPEC)],
            Self::HasConstant => &[Some(FIELD), Some(PARAM), Some(PROPERTY)],
            Self::HasCustomAttribute => &[
                Some(METHOD_DEF),
                Some(FIELD),
                Some(TYPE_REF),
                Some(TYPE_DEF),
                Some(PARAM),
                Some(INTERFACE_IMPL),
                Some(MEMBER_REF),
                Some(MODULE),
                Some(DECL_SECURITY),
                Some(PROPERTY),
                Some(EVENT),
                Some(STAND_ALONE_SIG),
                Some(MODULE_REF),
                Some(TYPE_SPEC),
                Some(ASSEMBLY),
                Some(ASSEMBLY_REF),
                Some(FILE),
                Some(EXPORTED_TYPE),
                Some(MANIFEST_RESOURCE),
                Some(GENERIC_PARAM),
                Some(GENERIC_PARAM_CONSTRAINT),
                Some(METHOD_SPEC),
            ],
            Self::HasFieldMarshal => &[Some(FIELD), Some(PARAM)],
            Self::HasDeclSecurity => &[Some(TYPE_DEF), Some(METHOD_DEF), Some(ASSEMBLY)],
            Self::MemberRefParent => &[
                Some(TYPE_DEF),
                Some(TYPE_REF),
                Some(MODULE_REF),
                Some(METHOD_DEF),
                Some(TYPE_SPEC),
            ],
            Self::HasSemantics => &[Some(EVENT), Some(PROPERTY)],
            Self::MethodDefOrRef => &[Some(METHOD_DEF), Some(MEMBER_REF)],
            Self::MemberForwarded => &[Some(FIELD), Some(METHOD_DEF)],
            Self::Implementation => &[Some(FILE), Some(ASSEMBLY_REF), Some(EXPORTED_TYPE)],
            Self::CustomAttributeType => &[None, None, Some(METHOD_DEF), Some(MEMBER_REF), None],
            Self::ResolutionScope => &[
                Some(MODULE),
                Some(MODULE_REF),
                Some(ASSEMBLY_REF),
                Some(TYPE_REF),
            ],
            Self::TypeOrMethodDef => &[Some(TYPE_DEF), Some(METHOD_DEF)],
        }
    }

    pub(crate) fn tag_bits(self) -> u32 {
        let tags = self.tables().len() as u32;
        u32::BITS - (tags - 1).leading_zeros()
    }

    /// Split an encoded value into `(table, row)`. Returns `None` for unused tags.
    pub(crate) fn decode(self, value: u32) -> Option<(usize, u32)> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let table = (*self.tables().get(tag)?)?;
        Some((table, value >> bits))
    }

    #[cfg(any(test, feature = "fixtures"))]
    pub(crate) fn encode(self, table: usize, row: u32) -> Option<u32> {
        let tag = self.tables().iter().position(|t| *t == Some(table))? as u32;
        Some(row << self.tag_bits() | tag)
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    U16,
    U32,
    String,
    Guid,
    Blob,
    Table(usize),
    Coded(CodedIndex),
}

/// Column layout of every table, indexed by table id.
fn schema(table: usize) -> &'static [Column] {
    use CodedIndex as C;
    use Column::*;

    match table {
        MODULE => &[U16, String, Guid, Guid, Guid],
        TYPE_REF => &[Coded(C::ResolutionScope), String, String],
        TYPE_DEF => &[
            U32,
            String,
            String,
            Coded(C::TypeDefOrRef),
            Table(FIELD),
            Table(METHOD_DEF),
        ],
        FIELD_PTR => &[Table(FIELD)],
        FIELD => &[U16, String, Blob],
        METHOD_PTR => &[Table(METHOD_DEF)],
        METHOD_DEF => &[U32, U16, U16, String, Blob, Table(PARAM)],
        PARAM_PTR => &[Table(PARAM)],
        PARAM => &[U16, U16, String],
        INTERFACE_IMPL => &[Table(TYPE_DEF), Coded(C::TypeDefOrRef)],
        MEMBER_REF => &[Coded(C::MemberRefParent), String, Blob],
        CONSTANT => &[U16, Coded(C::HasConstant), Blob],
        CUSTOM_ATTRIBUTE => &[
            Coded(C::HasCustomAttribute),
            Coded(C::CustomAttributeType),
            Blob,
        ],
        FIELD_MARSHAL => &[Coded(C::HasFieldMarshal), Blob],
        DECL_SECURITY => &[U16, Coded(C::HasDeclSecurity), Blob],
        CLASS_LAYOUT => &[U16, U32, Table(TYPE_DEF)],
        FIELD_LAYOUT => &[U32, Table(FIELD)],
        STAND_ALONE_SIG => &[Blob],
        EVENT_MAP => &[Table(TYPE_DEF), Table(EVENT)],
        EVENT_PTR => &[Table(EVENT)],
        EVENT => &[U16, String, Coded(C::TypeDefOrRef)],
        PROPERTY_MAP => &[Table(TYPE_DEF), Table(PROPERTY)],
        PROPERTY_PTR => &[Table(PROPERTY)],
        PROPERTY => &[U16, String, Blob],
        METHOD_SEMANTICS => &[U16, Table(METHOD_DEF), Coded(C::HasSemantics)],
        METHOD_IMPL => &[
            Table(TYPE_DEF),
            Coded(C::MethodDefOrRef),
            Coded(C::MethodDefOrRef),
        ],
        MODULE_REF => &[String],
        TYPE_SPEC => &[Blob],
        IMPL_MAP => &[
            U16,
            Coded(C::MemberForwarded),
            String,
            Table(MODULE_REF),
        ],
        FIELD_RVA => &[U32, Table(FIELD)],
        ENC_LOG => &[U32, U32],
        ENC_MAP => &[U32],
        ASSEMBLY => &[U32, U16, U16, U16, U16, U32, Blob, String, String],
        ASSEMBLY_PROCESSOR => &[U32],
        ASSEMBLY_OS => &[U32, U32, U32],
        ASSEMBLY_REF => &[U16, U16, U16, U16, U32, Blob, String, String, Blob],
        ASSEMBLY_REF_PROCESSOR => &[U32, Table(ASSEMBLY_REF)],
        ASSEMBLY_REF_OS => &[U32, U32, U32, Table(ASSEMBLY_REF)],
        FILE => &[U32, String, Blob],
        EXPORTED_TYPE => &[U32, U32, String, String, Coded(C::Implementation)],
        MANIFEST_RESOURCE => &[U32, U32, String, Coded(C::Implementation)],
        NESTED_CLASS => &[Table(TYPE_DEF), Table(TYPE_DEF)],
        GENERIC_PARAM => &[U16, U16, Coded(C::TypeOrMethodDef), String],
        METHOD_SPEC => &[Coded(C::MethodDefOrRef), Blob],
        GENERIC_PARAM_CONSTRAINT => &[Table(GENERIC_PARAM), Coded(C::TypeDefOrRef)],
        _ => &[],
    }
}

/// Index widths derived from the heap-size flags and row counts.
#[derive(Debug, Clone)]
struct Layout {
    rows: [u32; TABLE_COUNT],
    wide_strings: bool,
    wide_guids: bool,
    wide_blobs: bool,
}

impl Layout {
    fn width(&self, column: Column) -> usize {
        let wide = match column {
            Column::U16 => return 2,
            Column::U32 => return 4,
            Column::String => self.wide_strings,
            Column::Guid => self.wide_guids,
            Column::Blob => self.wide_blobs,
            Column::Table(table) => self.rows[table] > u32::from(u16::MAX),
            Column::Coded(coded) => {
                let largest = coded
                    .tables()
                    .iter()
                    .flatten()
                    .map(|table| self.rows[*table])
                    .max()
                    .unwrap_or(0);
                largest >= 1 << (16 - coded.tag_bits())
            }
        };
        if wide { 4 } else { 2 }
    }

    fn row_size(&self, table: usize) -> usize {
        schema(table).iter().map(|c| self.width(*c)).sum()
    }
}

/// Parsed table stream with per-table row slices.
#[derive(Debug)]
pub(crate) struct Tables<'a> {
    layout: Layout,
    data: [&'a [u8]; TABLE_COUNT],
}

impl<'a> Tables<'a> {
    pub(crate) fn parse(stream: &'a [u8]) -> AssemblyResult<Self> {
        let mut r = ByteReader::new(stream);
        r.skip(4)?; // reserved
        r.skip(2)?; // major, minor version
        let heap_sizes = r.u8()?;
        r.skip(1)?; // reserved
        let valid = r.u64()?;
        r.skip(8)?; // sorted

        if valid >> TABLE_COUNT != 0 {
            let table = u64::BITS - 1 - valid.leading_zeros();
            return Err(AssemblyError::MalformedMetadata(format!(
                "unsupported metadata table {table:#04x}"
            )));
        }

        let mut rows = [0u32; TABLE_COUNT];
        for (table, count) in rows.iter_mut().enumerate() {
            if valid & (1 << table) != 0 {
                *count = r.u32()?;
            }
        }
        if heap_sizes & EXTRA_DATA != 0 {
            r.skip(4)?;
        }

        let layout = Layout {
            rows,
            wide_strings: heap_sizes & WIDE_STRINGS != 0,
            wide_guids: heap_sizes & WIDE_GUIDS != 0,
            wide_blobs: heap_sizes & WIDE_BLOBS != 0,
        };

        let mut data: [&[u8]; TABLE_COUNT] = [&[]; TABLE_COUNT];
        for (table, slice) in data.iter_mut().enumerate() {
            let size = layout.row_size(table) * layout.rows[table] as usize;
            *slice = r.bytes(size)?;
        }

        Ok(Self { layout, data })
    }

    pub(crate) fn row_count(&self, table: usize) -> u32 {
        self.layout.rows.get(table).copied().unwrap_or(0)
    }

    /// Fetch a row by its 1-based row id.
    pub(crate) fn row(&self, table: usize, rid: u32) -> AssemblyResult<Row<'_, 'a>> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(AssemblyError::MalformedMetadata(format!(
                "row {rid} out of range for table {table:#04x}"
            )));
        }
        let size = self.layout.row_size(table);
        let start = (rid as usize - 1) * size;
        let bytes = ByteReader::at(self.data[table], start)?.bytes(size)?;
        Ok(Row {
            layout: &self.layout,
            table,
            bytes,
        })
    }

    /// Iterate rows `1..=row_count` of a table.
    pub(crate) fn rows(
        &self,
        table: usize,
    ) -> impl Iterator<Item = AssemblyResult<Row<'_, 'a>>> + '_ {
        (1..=self.row_count(table)).map(move |rid| self.row(table, rid))
    }
}

/// A single table row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Row<'t, 'a> {
    layout: &'t Layout,
    table: usize,
    bytes: &'a [u8],
}

impl Row<'_, '_> {
    /// Read column `column` as a raw integer (constant, heap index or table index).
    pub(crate) fn get(&self, column: usize) -> AssemblyResult<u32> {
        let columns = schema(self.table);
        let kind = *columns.get(column).ok_or_else(|| {
            AssemblyError::MalformedMetadata(format!(
                "column {column} out of range for table {:#04x}",
                self.table
            ))
        })?;
        let offset: usize = columns[..column]
            .iter()
            .map(|c| self.layout.width(*c))
            .sum();
        let mut r = ByteReader::at(self.bytes, offset)?;
        match self.layout.width(kind) {
            4 => r.u32(),
            _ => r.u16().map(u32::from),
        }
    }
}

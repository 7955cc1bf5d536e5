//! ECMA-335 metadata root, streams and heaps (Partition II, 24.2).

mod tables;

pub(crate) use tables::{CodedIndex, Tables, table};

use crate::reader::ByteReader;
use crate::{AssemblyError, AssemblyResult};

const METADATA_SIGNATURE: u32 = 0x424A_5342; // "BSJB"
const MAX_STREAM_NAME: usize = 32;

/// Decoded view over a metadata root.
#[derive(Debug)]
pub(crate) struct Metadata<'a> {
    strings: &'a [u8],
    blobs: &'a [u8],
    tables: Tables<'a>,
}

impl<'a> Metadata<'a> {
    pub(crate) fn parse(root: &'a [u8]) -> AssemblyResult<Self> {
        let mut r = ByteReader::new(root);
        if r.u32()? != METADATA_SIGNATURE {
            return Err(AssemblyError::MalformedMetadata(
                "missing BSJB signature".to_string(),
            ));
        }
        r.skip(8)?; // major, minor, reserved
        let version_length = r.u32()? as usize;
        r.skip(version_length)?;
        r.skip(2)?; // flags
        let stream_count = r.u16()?;

        let mut strings: &[u8] = &[];
        let mut blobs: &[u8] = &[];
        let mut table_stream = None;

        for _ in 0..stream_count {
            let offset = r.u32()? as usize;
            let size = r.u32()? as usize;
            let name = read_stream_name(&mut r)?;
            let body = ByteReader::at(root, offset)?.bytes(size)?;

            match name {
                "#~" | "#-" => table_stream = Some(body),
                "#Strings" => strings = body,
                "#Blob" => blobs = body,
                _ => {}
            }
        }

        let table_stream = table_stream.ok_or_else(|| {
            AssemblyError::MalformedMetadata("missing #~ table stream".to_string())
        })?;

        Ok(Self {
            strings,
            blobs,
            tables: Tables::parse(table_stream)?,
        })
    }

    pub(crate) fn tables(&self) -> &Tables<'a> {
        &self.tables
    }

    /// Read a null-terminated UTF-8 string from the `#Strings` heap.
    pub(crate) fn string(&self, index: u32) -> AssemblyResult<&'a str> {
        let tail = self.strings.get(index as usize..).ok_or_else(|| {
            AssemblyError::MalformedMetadata(format!("string index {index:#x} out of range"))
        })?;
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).map_err(|_| {
            AssemblyError::MalformedMetadata(format!("string at {index:#x} is not UTF-8"))
        })
    }

    /// Read a length-prefixed entry from the `#Blob` heap.
    pub(crate) fn blob(&self, index: u32) -> AssemblyResult<&'a [u8]> {
        if index == 0 && self.blobs.is_empty() {
            return Ok(&[]);
        }
        let mut r = ByteReader::at(self.blobs, index as usize)?;
        let length = r.compressed_u32()? as usize;
        r.bytes(length)
    }
}

fn read_stream_name<'a>(r: &mut ByteReader<'a>) -> AssemblyResult<&'a str> {
    let name = r.null_terminated(MAX_STREAM_NAME)?;
    r.align(4)?;
    std::str::from_utf8(name)
        .map_err(|_| AssemblyError::MalformedMetadata("stream name is not ASCII".to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::fixture::ModuleBuilder;
    use crate::pe::PeImage;

    fn with_metadata<T>(data: &[u8], f: impl FnOnce(&Metadata<'_>) -> T) -> T {
        let image = PeImage::parse(data).unwrap();
        let root = image.cli_metadata().unwrap().unwrap();
        let metadata = Metadata::parse(root).unwrap();
        f(&metadata)
    }

    #[test]
    fn Metadata___parse___rejects_missing_signature() {
        let err = Metadata::parse(&[0u8; 64]).unwrap_err();

        assert!(err.to_string().contains("BSJB"));
    }

    #[test]
    fn Metadata___string___reads_assembly_name() {
        let data = ModuleBuilder::new("Inedo.Extensions.Sample").build();

        let name = with_metadata(&data, |metadata| {
            let row = metadata.tables().row(table::ASSEMBLY, 1).unwrap();
            metadata.string(row.get(7).unwrap()).unwrap().to_string()
        });

        assert_eq!(name, "Inedo.Extensions.Sample");
    }

    #[test]
    fn Metadata___string___index_zero_is_empty() {
        let data = ModuleBuilder::new("Sample").build();

        let empty = with_metadata(&data, |metadata| metadata.string(0).unwrap().to_string());

        assert_eq!(empty, "");
    }

    #[test]
    fn Metadata___wide_heaps___decodes_same_values() {
        let narrow = ModuleBuilder::new("Sample").title("Wide").build();
        let wide = ModuleBuilder::new("Sample").title("Wide").wide_heaps().build();

        let read = |data: &[u8]| {
            with_metadata(data, |metadata| {
                let row = metadata.tables().row(table::ASSEMBLY, 1).unwrap();
                metadata.string(row.get(7).unwrap()).unwrap().to_string()
            })
        };

        assert_eq!(read(&narrow), read(&wide));
    }
}

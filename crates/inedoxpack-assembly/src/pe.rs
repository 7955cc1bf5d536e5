//! PE image headers and CLI header location.
//!
//! Only the parts of the PE format needed to find the CLI metadata root are
//! decoded: the DOS stub pointer, the COFF header, the optional header's data
//! directories, and the section table used to map RVAs to file offsets.

use crate::reader::ByteReader;
use crate::{AssemblyError, AssemblyResult};

const DOS_SIGNATURE: u16 = 0x5A4D; // "MZ"
const PE_POINTER_OFFSET: usize = 0x3C;
const PE_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const PE32_MAGIC: u16 = 0x010B;
const PE32_PLUS_MAGIC: u16 = 0x020B;
const CLI_HEADER_DIRECTORY: usize = 14;
const SECTION_HEADER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

#[derive(Debug, Clone, Copy)]
struct DataDirectory {
    rva: u32,
    size: u32,
}

/// A parsed PE image borrowing the file contents.
#[derive(Debug)]
pub(crate) struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<Section>,
    cli_header: Option<DataDirectory>,
}

impl<'a> PeImage<'a> {
    /// Parse the PE headers. Any failure here means the file is not a PE image.
    pub(crate) fn parse(data: &'a [u8]) -> AssemblyResult<Self> {
        Self::parse_headers(data).map_err(|e| match e {
            AssemblyError::Truncated { .. } => {
                AssemblyError::InvalidImage(format!("truncated headers ({e})"))
            }
            other => other,
        })
    }

    fn parse_headers(data: &'a [u8]) -> AssemblyResult<Self> {
        let mut dos = ByteReader::new(data);
        if dos.u16()? != DOS_SIGNATURE {
            return Err(AssemblyError::InvalidImage(
                "missing MZ signature".to_string(),
            ));
        }

        let pe_offset = ByteReader::at(data, PE_POINTER_OFFSET)?.u32()? as usize;
        let mut pe = ByteReader::at(data, pe_offset)?;
        if pe.u32()? != PE_SIGNATURE {
            return Err(AssemblyError::InvalidImage(
                "missing PE signature".to_string(),
            ));
        }

        // COFF file header
        pe.skip(2)?; // machine
        let section_count = pe.u16()?;
        pe.skip(12)?; // timestamp, symbol table pointer, symbol count
        let optional_header_size = usize::from(pe.u16()?);
        pe.skip(2)?; // characteristics

        let optional_header = pe.position();
        let directory_count_offset = match pe.u16()? {
            PE32_MAGIC => 92,
            PE32_PLUS_MAGIC => 108,
            other => {
                return Err(AssemblyError::InvalidImage(format!(
                    "unknown optional header magic {other:#06x}"
                )));
            }
        };

        let mut directories = ByteReader::at(data, optional_header + directory_count_offset)?;
        let directory_count = directories.u32()? as usize;
        let cli_header = if directory_count > CLI_HEADER_DIRECTORY {
            directories.skip(CLI_HEADER_DIRECTORY * 8)?;
            let rva = directories.u32()?;
            let size = directories.u32()?;
            (rva != 0 && size != 0).then_some(DataDirectory { rva, size })
        } else {
            None
        };

        let mut table = ByteReader::at(data, optional_header + optional_header_size)?;
        let mut sections = Vec::with_capacity(usize::from(section_count));
        for _ in 0..section_count {
            let header = table.bytes(SECTION_HEADER_SIZE)?;
            let mut section = ByteReader::new(header);
            section.skip(8)?; // name
            let virtual_size = section.u32()?;
            let virtual_address = section.u32()?;
            let raw_size = section.u32()?;
            let raw_pointer = section.u32()?;
            sections.push(Section {
                virtual_address,
                virtual_size,
                raw_size,
                raw_pointer,
            });
        }

        Ok(Self {
            data,
            sections,
            cli_header,
        })
    }

    /// Locate the CLI metadata root (`BSJB` block).
    pub(crate) fn cli_metadata(&self) -> AssemblyResult<Option<&'a [u8]>> {
        let Some(directory) = self.cli_header else {
            return Ok(None);
        };

        let header = self.slice_at_rva(directory.rva, directory.size)?;
        let mut cli = ByteReader::new(header);
        cli.skip(8)?; // cb, major/minor runtime version
        let metadata_rva = cli.u32()?;
        let metadata_size = cli.u32()?;

        self.slice_at_rva(metadata_rva, metadata_size).map(Some)
    }

    fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.sections.iter().find_map(|section| {
            let extent = section.virtual_size.max(section.raw_size);
            let delta = rva.checked_sub(section.virtual_address)?;
            (delta < extent).then(|| section.raw_pointer as usize + delta as usize)
        })
    }

    fn slice_at_rva(&self, rva: u32, size: u32) -> AssemblyResult<&'a [u8]> {
        let offset = self.rva_to_offset(rva).ok_or_else(|| {
            AssemblyError::MalformedMetadata(format!("RVA {rva:#x} is outside every section"))
        })?;
        ByteReader::at(self.data, offset)?.bytes(size as usize)
    }
}

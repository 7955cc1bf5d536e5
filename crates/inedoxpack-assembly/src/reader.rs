//! Bounds-checked little-endian cursor over an in-memory image.

use crate::{AssemblyError, AssemblyResult};

#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at `pos`, which may equal the length of `data`.
    pub(crate) fn at(data: &'a [u8], pos: usize) -> AssemblyResult<Self> {
        if pos > data.len() {
            return Err(AssemblyError::Truncated {
                offset: pos,
                needed: 0,
            });
        }
        Ok(Self { data, pos })
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> AssemblyResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(AssemblyError::Truncated {
                offset: self.pos,
                needed: len,
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn skip(&mut self, len: usize) -> AssemblyResult<()> {
        self.bytes(len).map(|_| ())
    }

    /// Advance to the next multiple of `alignment` (relative to the start of the data).
    pub(crate) fn align(&mut self, alignment: usize) -> AssemblyResult<()> {
        let padding = (alignment - self.pos % alignment) % alignment;
        self.skip(padding)
    }

    pub(crate) fn u8(&mut self) -> AssemblyResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> AssemblyResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> AssemblyResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> AssemblyResult<u64> {
        let lo = u64::from(self.u32()?);
        let hi = u64::from(self.u32()?);
        Ok(hi << 32 | lo)
    }

    /// Read a null-terminated byte string of at most `max` bytes, consuming the terminator.
    pub(crate) fn null_terminated(&mut self, max: usize) -> AssemblyResult<&'a [u8]> {
        let offset = self.pos;
        let length = self.data[self.pos..]
            .iter()
            .take(max + 1)
            .position(|b| *b == 0)
            .ok_or_else(|| {
                AssemblyError::MalformedMetadata(format!(
                    "unterminated string at offset {offset:#x}"
                ))
            })?;
        let bytes = self.bytes(length)?;
        self.skip(1)?;
        Ok(bytes)
    }

    /// Read an ECMA-335 compressed unsigned integer (II.23.2).
    pub(crate) fn compressed_u32(&mut self) -> AssemblyResult<u32> {
        let offset = self.pos;
        let first = self.u8()?;
        if first & 0x80 == 0 {
            Ok(u32::from(first))
        } else if first & 0xC0 == 0x80 {
            let second = self.u8()?;
            Ok(u32::from(first & 0x3F) << 8 | u32::from(second))
        } else if first & 0xE0 == 0xC0 {
            let rest = self.bytes(3)?;
            Ok(u32::from(first & 0x1F) << 24
                | u32::from(rest[0]) << 16
                | u32::from(rest[1]) << 8
                | u32::from(rest[2]))
        } else {
            Err(AssemblyError::MalformedMetadata(format!(
                "invalid compressed integer at offset {offset:#x}"
            )))
        }
    }
}

//! Custom attribute value blobs (Partition II, 23.3).

use crate::reader::ByteReader;
use crate::{AssemblyError, AssemblyResult, HostProducts};

const PROLOG: u16 = 0x0001;
const NULL_STRING: u8 = 0xFF;

/// Byte offset of the first fixed argument, directly after the prolog.
const FIRST_ARGUMENT: usize = 2;

/// Decode the first fixed argument of an attribute whose constructor takes a
/// single `string`. Returns `None` for a null string.
pub(crate) fn decode_string_argument(blob: &[u8]) -> AssemblyResult<Option<String>> {
    let mut r = ByteReader::new(blob);
    let prolog = r.u16()?;
    if prolog != PROLOG {
        return Err(AssemblyError::MalformedMetadata(format!(
            "invalid custom attribute prolog {prolog:#06x}"
        )));
    }

    if blob.get(FIRST_ARGUMENT) == Some(&NULL_STRING) {
        return Ok(None);
    }

    let length = r.compressed_u32()? as usize;
    let bytes = r.bytes(length)?;
    let value = std::str::from_utf8(bytes).map_err(|_| {
        AssemblyError::MalformedMetadata("custom attribute string is not UTF-8".to_string())
    })?;
    Ok(Some(value.to_string()))
}

/// Decode the product flags carried by an `AppliesToAttribute` value.
///
/// The constructor's single argument is an enum stored as a little-endian
/// `i32` right after the prolog. Returns `None` when the blob is too short
/// to hold it.
///
/// # Example
///
/// ```
/// use inedoxpack_assembly::{HostProduct, decode_applies_to};
///
/// let products = decode_applies_to(&[0x01, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap();
/// assert!(products.contains(HostProduct::ProGet));
/// ```
#[must_use]
pub fn decode_applies_to(blob: &[u8]) -> Option<HostProducts> {
    let bytes = blob.get(FIRST_ARGUMENT..FIRST_ARGUMENT + 4)?;
    let bits = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Some(HostProducts::from_bits(bits))
}

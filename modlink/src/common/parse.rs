use scursor::ReadCursor;

use crate::common::bits::{num_bytes_for_bits, unpack_bits};
use crate::common::traits::Parse;
use crate::error::AduParseError;
use crate::types::{coil_from_u16, AddressRange, Indexed, WriteMultiple};

impl Parse for AddressRange {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        Ok(AddressRange::try_from(
            cursor.read_u16_be()?,
            cursor.read_u16_be()?,
        )?)
    }
}

impl Parse for Indexed<bool> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        let index = cursor.read_u16_be()?;
        let value = coil_from_u16(cursor.read_u16_be()?)?;
        Ok(Indexed::new(index, value))
    }
}

impl Parse for Indexed<u16> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        Ok(Indexed::new(
            cursor.read_u16_be()?,
            cursor.read_u16_be()?,
        ))
    }
}

impl Parse for WriteMultiple<bool> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        let range = AddressRange::parse(cursor)?;
        let bytes = read_byte_counted(cursor, num_bytes_for_bits(range.count))?;
        Ok(WriteMultiple {
            range,
            values: unpack_bits(&bytes, range.count),
        })
    }
}

impl Parse for WriteMultiple<u16> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        let range = AddressRange::parse(cursor)?;
        let bytes = read_byte_counted(cursor, 2 * range.count as usize)?;
        Ok(WriteMultiple {
            range,
            values: registers_from_be(&bytes),
        })
    }
}

/// read a u8 byte count that must equal `expected`, then that many bytes
pub(crate) fn read_byte_counted(
    cursor: &mut ReadCursor,
    expected: usize,
) -> Result<Vec<u8>, AduParseError> {
    let byte_count = cursor.read_u8()? as usize;
    if byte_count != expected {
        return Err(AduParseError::RequestByteCountMismatch(expected, byte_count));
    }
    let remaining = cursor.remaining();
    if byte_count > remaining {
        return Err(AduParseError::InsufficientBytesForByteCount(
            byte_count, remaining,
        ));
    }
    Ok(cursor.read_bytes(byte_count)?.to_vec())
}

pub(crate) fn registers_from_be(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

pub(crate) fn expect_empty(cursor: &ReadCursor) -> Result<(), AduParseError> {
    match cursor.remaining() {
        0 => Ok(()),
        n => Err(AduParseError::TrailingBytes(n)),
    }
}

use scursor::WriteCursor;

use crate::common::bits::pack_bits;
use crate::common::traits::Serialize;
use crate::error::{InternalError, RequestError};
use crate::types::{coil_to_u16, AddressRange, Indexed, WriteMultiple};

pub(crate) fn calc_bytes_for_bits(num_bits: usize) -> Result<u8, InternalError> {
    let div_8 = num_bits / 8;

    let count = if num_bits % 8 == 0 { div_8 } else { div_8 + 1 };

    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

pub(crate) fn calc_bytes_for_registers(num_registers: usize) -> Result<u8, InternalError> {
    let count = 2 * num_registers;
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

impl Serialize for AddressRange {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.start)?;
        cursor.write_u16_be(self.count)?;
        Ok(())
    }
}

impl Serialize for Indexed<bool> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.index)?;
        cursor.write_u16_be(coil_to_u16(self.value))?;
        Ok(())
    }
}

impl Serialize for Indexed<u16> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.index)?;
        cursor.write_u16_be(self.value)?;
        Ok(())
    }
}

/// byte count followed by the bits packed LSB-first
impl Serialize for &[bool] {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        let num_bytes = calc_bytes_for_bits(self.len())?;
        cursor.write_u8(num_bytes)?;

        for byte in pack_bits(self) {
            cursor.write_u8(byte)?;
        }

        Ok(())
    }
}

/// byte count followed by the registers in big-endian
impl Serialize for &[u16] {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        let num_bytes = calc_bytes_for_registers(self.len())?;
        cursor.write_u8(num_bytes)?;

        for value in *self {
            cursor.write_u16_be(*value)?;
        }

        Ok(())
    }
}

impl Serialize for WriteMultiple<bool> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.range.serialize(cursor)?;
        self.values.as_slice().serialize(cursor)
    }
}

impl Serialize for WriteMultiple<u16> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.range.serialize(cursor)?;
        self.values.as_slice().serialize(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_address_range() {
        let range = AddressRange::try_from(3, 512).unwrap();
        let mut buffer = [0u8; 4];
        let mut cursor = WriteCursor::new(&mut buffer);
        range.serialize(&mut cursor).unwrap();
        assert_eq!(buffer, [0x00, 0x03, 0x02, 0x00]);
    }

    #[test]
    fn serializes_coils_with_byte_count() {
        let coils = [true, false, true, true, false, false, false, false, true, false];
        let mut buffer = [0u8; 3];
        let mut cursor = WriteCursor::new(&mut buffer);
        coils.as_slice().serialize(&mut cursor).unwrap();
        assert_eq!(buffer, [0x02, 0x0D, 0x01]);
    }

    #[test]
    fn byte_count_overflow_is_an_internal_error() {
        assert_eq!(calc_bytes_for_registers(128), Err(InternalError::BadByteCount(256)));
        assert_eq!(calc_bytes_for_bits(2040), Ok(255));
    }

    #[test]
    fn writing_past_the_buffer_fails() {
        let mut buffer = [0u8; 3];
        let mut cursor = WriteCursor::new(&mut buffer);
        let err = Indexed::new(1u16, 0xCAFEu16)
            .serialize(&mut cursor)
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::Internal(InternalError::InsufficientWriteSpace)
        );
    }
}

use crate::codec::encode_request;
use crate::codec::response::response_pdu_length;
use crate::command::Command;
use crate::error::{FrameParseError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const ADDRESS_LENGTH: usize = 1;
    pub(crate) const CRC_LENGTH: usize = 2;
}

/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// CRC-16/MODBUS of `bytes`
///
/// Initial value 0xFFFF, reflected polynomial 0xA001, no final XOR.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

/// Append the CRC of `payload` in little-endian byte order
pub fn wrap(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + constants::CRC_LENGTH);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&crc16(payload).to_le_bytes());
    frame
}

/// Validate and strip the trailing CRC
pub fn unwrap(frame: &[u8]) -> Result<&[u8], RequestError> {
    if frame.len() < constants::CRC_LENGTH {
        return Err(FrameParseError::FrameTooShort(frame.len()).into());
    }

    let (payload, crc) = frame.split_at(frame.len() - constants::CRC_LENGTH);
    let received = u16::from_le_bytes([crc[0], crc[1]]);
    let expected = crc16(payload);

    if received != expected {
        return Err(FrameParseError::CrcValidationFailure(received, expected).into());
    }

    Ok(payload)
}

/// Prefix `payload` with the device address and append the CRC, as sent on a serial line
pub fn wrap_adu(unit_id: UnitId, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(constants::ADDRESS_LENGTH + payload.len());
    data.push(unit_id.value);
    data.extend_from_slice(payload);
    wrap(&data)
}

/// Encode a command into a complete RTU request frame
pub fn format_adu(command: &Command) -> Result<Vec<u8>, RequestError> {
    let payload = encode_request(command)?;
    Ok(wrap_adu(command.unit_id(), &payload))
}

/// Validate a complete RTU frame and split it into the device address and payload
pub fn parse_adu(frame: &[u8]) -> Result<(UnitId, &[u8]), RequestError> {
    match unwrap(frame)?.split_first() {
        Some((address, payload)) => Ok((UnitId::new(*address), payload)),
        None => Err(FrameParseError::FrameTooShort(frame.len()).into()),
    }
}

/// Size of the complete RTU response frame (address + payload + CRC) for `command`
pub fn response_length(command: &Command) -> usize {
    constants::ADDRESS_LENGTH + response_pdu_length(command) + constants::CRC_LENGTH
}

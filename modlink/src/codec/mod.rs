//! Application layer encoding shared by both transports
//!
//! A payload is the function code followed by the function-specific fields. It
//! excludes the unit id, which belongs to the framing layer (the MBAP header on
//! TCP, the address byte on a serial line).

use scursor::WriteCursor;

use crate::common::function::FunctionCode;
use crate::common::traits::Serialize;
use crate::error::{InternalError, RequestError};

pub(crate) mod request;
pub(crate) mod response;

pub use request::{decode_request, encode_request};
pub use response::{decode_response, encode_response};

/// Maximum size of a payload (function code + data)
pub const MAX_PDU_LENGTH: usize = 253;

pub(crate) fn format_pdu(
    function: FunctionCode,
    body: &dyn Serialize,
) -> Result<Vec<u8>, RequestError> {
    let mut buffer = [0u8; MAX_PDU_LENGTH];
    let mut cursor = WriteCursor::new(&mut buffer);
    cursor.write_u8(function.get_value())?;
    body.serialize(&mut cursor)?;
    let length = cursor.position();
    match buffer.get(..length) {
        Some(payload) => Ok(payload.to_vec()),
        None => Err(InternalError::AduTooBig(length).into()),
    }
}

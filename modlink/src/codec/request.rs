use scursor::ReadCursor;

use crate::codec::format_pdu;
use crate::command::Command;
use crate::common::function::FunctionCode;
use crate::common::parse::expect_empty;
use crate::common::traits::Parse;
use crate::constants::limits;
use crate::error::{AduParseError, RequestError};
use crate::types::{AddressRange, Indexed, UnitId, WriteMultiple};

/// Encode a command into its request payload
///
/// The command is validated first, so hand-built commands that bypass the
/// constructors fail with [`RequestError::BadRequest`] instead of producing an
/// invalid frame.
pub fn encode_request(command: &Command) -> Result<Vec<u8>, RequestError> {
    command.validate()?;
    let function = command.function();
    match command {
        Command::ReadCoils { range, .. }
        | Command::ReadDiscreteInputs { range, .. }
        | Command::ReadHoldingRegisters { range, .. }
        | Command::ReadInputRegisters { range, .. } => format_pdu(function, range),
        Command::WriteSingleCoil { value, .. } => format_pdu(function, value),
        Command::WriteSingleRegister { value, .. } => format_pdu(function, value),
        Command::WriteMultipleCoils { values, .. } => format_pdu(function, values),
        Command::WriteMultipleRegisters { values, .. } => format_pdu(function, values),
    }
}

/// Recover the command from a request payload and the unit id supplied by the framing layer
pub fn decode_request(unit_id: UnitId, payload: &[u8]) -> Result<Command, RequestError> {
    parse_request(unit_id, payload).map_err(RequestError::MalformedRequest)
}

fn parse_request(unit_id: UnitId, payload: &[u8]) -> Result<Command, AduParseError> {
    let mut cursor = ReadCursor::new(payload);
    let raw = cursor.read_u8()?;
    let function = FunctionCode::get(raw).ok_or(AduParseError::UnknownFunction(raw))?;

    let command = match function {
        FunctionCode::ReadCoils => Command::ReadCoils {
            unit_id,
            range: parse_range(&mut cursor, limits::MAX_READ_COILS_COUNT)?,
        },
        FunctionCode::ReadDiscreteInputs => Command::ReadDiscreteInputs {
            unit_id,
            range: parse_range(&mut cursor, limits::MAX_READ_COILS_COUNT)?,
        },
        FunctionCode::ReadHoldingRegisters => Command::ReadHoldingRegisters {
            unit_id,
            range: parse_range(&mut cursor, limits::MAX_READ_REGISTERS_COUNT)?,
        },
        FunctionCode::ReadInputRegisters => Command::ReadInputRegisters {
            unit_id,
            range: parse_range(&mut cursor, limits::MAX_READ_REGISTERS_COUNT)?,
        },
        FunctionCode::WriteSingleCoil => Command::WriteSingleCoil {
            unit_id,
            value: Indexed::<bool>::parse(&mut cursor)?,
        },
        FunctionCode::WriteSingleRegister => Command::WriteSingleRegister {
            unit_id,
            value: Indexed::<u16>::parse(&mut cursor)?,
        },
        FunctionCode::WriteMultipleCoils => {
            let values = WriteMultiple::<bool>::parse(&mut cursor)?;
            values.range.limited_count(limits::MAX_WRITE_COILS_COUNT)?;
            Command::WriteMultipleCoils { unit_id, values }
        }
        FunctionCode::WriteMultipleRegisters => {
            let values = WriteMultiple::<u16>::parse(&mut cursor)?;
            values.range.limited_count(limits::MAX_WRITE_REGISTERS_COUNT)?;
            Command::WriteMultipleRegisters { unit_id, values }
        }
    };

    expect_empty(&cursor)?;
    Ok(command)
}

fn parse_range(cursor: &mut ReadCursor, limit: u16) -> Result<AddressRange, AduParseError> {
    Ok(AddressRange::parse(cursor)?.limited_count(limit)?)
}

use scursor::ReadCursor;

use crate::codec::format_pdu;
use crate::command::{Command, Values};
use crate::common::bits::{num_bytes_for_bits, unpack_bits};
use crate::common::parse::{read_byte_counted, registers_from_be};
use crate::common::traits::Parse;
use crate::error::{AduParseError, InvalidRequest, RequestError};
use crate::exception::ExceptionCode;
use crate::types::{AddressRange, Indexed};

/// Encode the response a device would send for `command`
///
/// Read commands require values of the matching kind and count. Write commands
/// echo the request fields and ignore `values`.
pub fn encode_response(
    command: &Command,
    values: Option<&Values>,
) -> Result<Vec<u8>, RequestError> {
    let function = command.function();
    match command {
        Command::ReadCoils { range, .. } | Command::ReadDiscreteInputs { range, .. } => {
            let bits = match values {
                Some(Values::Bits(x)) => x.as_slice(),
                _ => return Err(InvalidRequest::ValueTypeMismatch.into()),
            };
            check_count(*range, bits.len())?;
            format_pdu(function, &bits)
        }
        Command::ReadHoldingRegisters { range, .. }
        | Command::ReadInputRegisters { range, .. } => {
            let registers = match values {
                Some(Values::Registers(x)) => x.as_slice(),
                _ => return Err(InvalidRequest::ValueTypeMismatch.into()),
            };
            check_count(*range, registers.len())?;
            format_pdu(function, &registers)
        }
        Command::WriteSingleCoil { value, .. } => format_pdu(function, value),
        Command::WriteSingleRegister { value, .. } => format_pdu(function, value),
        Command::WriteMultipleCoils { values, .. } => format_pdu(function, &values.range),
        Command::WriteMultipleRegisters { values, .. } => format_pdu(function, &values.range),
    }
}

/// size of the successful response payload for `command`, function code included
pub(crate) fn response_pdu_length(command: &Command) -> usize {
    match command {
        Command::ReadCoils { range, .. } | Command::ReadDiscreteInputs { range, .. } => {
            2 + num_bytes_for_bits(range.count)
        }
        Command::ReadHoldingRegisters { range, .. }
        | Command::ReadInputRegisters { range, .. } => 2 + 2 * range.count as usize,
        Command::WriteSingleCoil { .. }
        | Command::WriteSingleRegister { .. }
        | Command::WriteMultipleCoils { .. }
        | Command::WriteMultipleRegisters { .. } => 5,
    }
}

fn check_count(range: AddressRange, actual: usize) -> Result<(), InvalidRequest> {
    if range.count as usize != actual {
        return Err(InvalidRequest::ValueCountMismatch(range.count as usize, actual));
    }
    Ok(())
}

/// Decode a response payload using the command that produced it as context
///
/// Returns `None` for write acknowledgements along with any bytes left after the
/// response. An exception response fails with [`RequestError::Exception`].
pub fn decode_response<'a>(
    command: &Command,
    payload: &'a [u8],
) -> Result<(Option<Values>, &'a [u8]), RequestError> {
    let mut cursor = ReadCursor::new(payload);
    let function = command.function();

    let raw = cursor.read_u8().map_err(AduParseError::from)?;
    if raw == function.as_error() {
        let code = cursor.read_u8().map_err(AduParseError::from)?;
        return Err(RequestError::Exception(ExceptionCode::from(code)));
    }
    if raw != function.get_value() {
        return Err(AduParseError::UnknownResponseFunction(
            raw,
            function.get_value(),
            function.as_error(),
        )
        .into());
    }

    let values = parse_body(command, &mut cursor)?;

    let consumed = payload.len() - cursor.remaining();
    Ok((values, &payload[consumed..]))
}

fn parse_body(
    command: &Command,
    cursor: &mut ReadCursor,
) -> Result<Option<Values>, AduParseError> {
    match command {
        Command::ReadCoils { range, .. } | Command::ReadDiscreteInputs { range, .. } => {
            let bytes = read_byte_counted(cursor, num_bytes_for_bits(range.count))?;
            Ok(Some(Values::Bits(unpack_bits(&bytes, range.count))))
        }
        Command::ReadHoldingRegisters { range, .. }
        | Command::ReadInputRegisters { range, .. } => {
            let bytes = read_byte_counted(cursor, 2 * range.count as usize)?;
            Ok(Some(Values::Registers(registers_from_be(&bytes))))
        }
        Command::WriteSingleCoil { value, .. } => {
            expect_echo(value, &Indexed::<bool>::parse(cursor)?)?;
            Ok(None)
        }
        Command::WriteSingleRegister { value, .. } => {
            expect_echo(value, &Indexed::<u16>::parse(cursor)?)?;
            Ok(None)
        }
        Command::WriteMultipleCoils { values, .. } => {
            expect_echo(&values.range, &AddressRange::parse(cursor)?)?;
            Ok(None)
        }
        Command::WriteMultipleRegisters { values, .. } => {
            expect_echo(&values.range, &AddressRange::parse(cursor)?)?;
            Ok(None)
        }
    }
}

fn expect_echo<T: PartialEq>(sent: &T, received: &T) -> Result<(), AduParseError> {
    if sent != received {
        return Err(AduParseError::ReplyEchoMismatch);
    }
    Ok(())
}

use crate::common::function::FunctionCode;
use crate::constants::limits;
use crate::decode::AppDecodeLevel;
use crate::error::{InvalidRange, InvalidRequest};
use crate::types::{AddressRange, Indexed, UnitId, WriteMultiple};

/// The closed set of commands a client can issue
///
/// Every variant carries the unit id of the target device. The variant
/// fixes which fields are present on the wire and their encoding width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Read a range of coils
    ReadCoils {
        /// target device
        unit_id: UnitId,
        /// coils to read
        range: AddressRange,
    },
    /// Read a range of discrete inputs
    ReadDiscreteInputs {
        /// target device
        unit_id: UnitId,
        /// inputs to read
        range: AddressRange,
    },
    /// Read a range of holding registers
    ReadHoldingRegisters {
        /// target device
        unit_id: UnitId,
        /// registers to read
        range: AddressRange,
    },
    /// Read a range of input registers
    ReadInputRegisters {
        /// target device
        unit_id: UnitId,
        /// registers to read
        range: AddressRange,
    },
    /// Write a single coil
    WriteSingleCoil {
        /// target device
        unit_id: UnitId,
        /// address and state of the coil
        value: Indexed<bool>,
    },
    /// Write a single holding register
    WriteSingleRegister {
        /// target device
        unit_id: UnitId,
        /// address and value of the register
        value: Indexed<u16>,
    },
    /// Write a contiguous block of coils
    WriteMultipleCoils {
        /// target device
        unit_id: UnitId,
        /// starting address and coil states
        values: WriteMultiple<bool>,
    },
    /// Write a contiguous block of holding registers
    WriteMultipleRegisters {
        /// target device
        unit_id: UnitId,
        /// starting address and register values
        values: WriteMultiple<u16>,
    },
}

/// Values carried by a read response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Values {
    /// coils or discrete inputs
    Bits(Vec<bool>),
    /// holding or input registers
    Registers(Vec<u16>),
}

impl Values {
    /// number of values
    pub fn len(&self) -> usize {
        match self {
            Values::Bits(x) => x.len(),
            Values::Registers(x) => x.len(),
        }
    }

    /// true if there are no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// bit values, if this is a bit response
    pub fn as_bits(&self) -> Option<&[bool]> {
        match self {
            Values::Bits(x) => Some(x.as_slice()),
            Values::Registers(_) => None,
        }
    }

    /// register values, if this is a register response
    pub fn as_registers(&self) -> Option<&[u16]> {
        match self {
            Values::Bits(_) => None,
            Values::Registers(x) => Some(x.as_slice()),
        }
    }
}

impl Command {
    /// Build a read coils command, validating the range
    pub fn read_coils(unit_id: UnitId, start: u16, count: u16) -> Result<Self, InvalidRequest> {
        Ok(Command::ReadCoils {
            unit_id,
            range: read_range(start, count, limits::MAX_READ_COILS_COUNT)?,
        })
    }

    /// Build a read discrete inputs command, validating the range
    pub fn read_discrete_inputs(
        unit_id: UnitId,
        start: u16,
        count: u16,
    ) -> Result<Self, InvalidRequest> {
        Ok(Command::ReadDiscreteInputs {
            unit_id,
            range: read_range(start, count, limits::MAX_READ_COILS_COUNT)?,
        })
    }

    /// Build a read holding registers command, validating the range
    pub fn read_holding_registers(
        unit_id: UnitId,
        start: u16,
        count: u16,
    ) -> Result<Self, InvalidRequest> {
        Ok(Command::ReadHoldingRegisters {
            unit_id,
            range: read_range(start, count, limits::MAX_READ_REGISTERS_COUNT)?,
        })
    }

    /// Build a read input registers command, validating the range
    pub fn read_input_registers(
        unit_id: UnitId,
        start: u16,
        count: u16,
    ) -> Result<Self, InvalidRequest> {
        Ok(Command::ReadInputRegisters {
            unit_id,
            range: read_range(start, count, limits::MAX_READ_REGISTERS_COUNT)?,
        })
    }

    /// Build a write single coil command
    pub fn write_single_coil(unit_id: UnitId, address: u16, value: bool) -> Self {
        Command::WriteSingleCoil {
            unit_id,
            value: Indexed::new(address, value),
        }
    }

    /// Build a write single register command
    pub fn write_single_register(unit_id: UnitId, address: u16, value: u16) -> Self {
        Command::WriteSingleRegister {
            unit_id,
            value: Indexed::new(address, value),
        }
    }

    /// Build a write multiple coils command, validating the count
    pub fn write_multiple_coils(
        unit_id: UnitId,
        start: u16,
        values: Vec<bool>,
    ) -> Result<Self, InvalidRequest> {
        let values = WriteMultiple::from(start, values)?;
        values.range.limited_count(limits::MAX_WRITE_COILS_COUNT)?;
        Ok(Command::WriteMultipleCoils { unit_id, values })
    }

    /// Build a write multiple registers command, validating the count
    pub fn write_multiple_registers(
        unit_id: UnitId,
        start: u16,
        values: Vec<u16>,
    ) -> Result<Self, InvalidRequest> {
        let values = WriteMultiple::from(start, values)?;
        values.range.limited_count(limits::MAX_WRITE_REGISTERS_COUNT)?;
        Ok(Command::WriteMultipleRegisters { unit_id, values })
    }

    /// unit id of the target device
    pub fn unit_id(&self) -> UnitId {
        match self {
            Command::ReadCoils { unit_id, .. }
            | Command::ReadDiscreteInputs { unit_id, .. }
            | Command::ReadHoldingRegisters { unit_id, .. }
            | Command::ReadInputRegisters { unit_id, .. }
            | Command::WriteSingleCoil { unit_id, .. }
            | Command::WriteSingleRegister { unit_id, .. }
            | Command::WriteMultipleCoils { unit_id, .. }
            | Command::WriteMultipleRegisters { unit_id, .. } => *unit_id,
        }
    }

    /// function code used to encode this command
    pub fn function(&self) -> FunctionCode {
        match self {
            Command::ReadCoils { .. } => FunctionCode::ReadCoils,
            Command::ReadDiscreteInputs { .. } => FunctionCode::ReadDiscreteInputs,
            Command::ReadHoldingRegisters { .. } => FunctionCode::ReadHoldingRegisters,
            Command::ReadInputRegisters { .. } => FunctionCode::ReadInputRegisters,
            Command::WriteSingleCoil { .. } => FunctionCode::WriteSingleCoil,
            Command::WriteSingleRegister { .. } => FunctionCode::WriteSingleRegister,
            Command::WriteMultipleCoils { .. } => FunctionCode::WriteMultipleCoils,
            Command::WriteMultipleRegisters { .. } => FunctionCode::WriteMultipleRegisters,
        }
    }

    /// first address the command operates on
    pub fn start_address(&self) -> u16 {
        match self {
            Command::ReadCoils { range, .. }
            | Command::ReadDiscreteInputs { range, .. }
            | Command::ReadHoldingRegisters { range, .. }
            | Command::ReadInputRegisters { range, .. } => range.start,
            Command::WriteSingleCoil { value, .. } => value.index,
            Command::WriteSingleRegister { value, .. } => value.index,
            Command::WriteMultipleCoils { values, .. } => values.range.start,
            Command::WriteMultipleRegisters { values, .. } => values.range.start,
        }
    }

    /// Check the invariants the constructors enforce, since the fields are public
    pub(crate) fn validate(&self) -> Result<(), InvalidRequest> {
        match self {
            Command::ReadCoils { range, .. } | Command::ReadDiscreteInputs { range, .. } => {
                read_range(range.start, range.count, limits::MAX_READ_COILS_COUNT)?;
            }
            Command::ReadHoldingRegisters { range, .. }
            | Command::ReadInputRegisters { range, .. } => {
                read_range(range.start, range.count, limits::MAX_READ_REGISTERS_COUNT)?;
            }
            Command::WriteSingleCoil { .. } | Command::WriteSingleRegister { .. } => {}
            Command::WriteMultipleCoils { values, .. } => {
                check_write_multiple(values, limits::MAX_WRITE_COILS_COUNT)?;
            }
            Command::WriteMultipleRegisters { values, .. } => {
                check_write_multiple(values, limits::MAX_WRITE_REGISTERS_COUNT)?;
            }
        }
        Ok(())
    }
}

fn read_range(start: u16, count: u16, limit: u16) -> Result<AddressRange, InvalidRange> {
    AddressRange::try_from(start, count)?.limited_count(limit)
}

fn check_write_multiple<T>(values: &WriteMultiple<T>, limit: u16) -> Result<(), InvalidRequest> {
    read_range(values.range.start, values.range.count, limit)?;
    if values.values.len() != values.range.count as usize {
        return Err(InvalidRequest::ValueCountMismatch(
            values.range.count as usize,
            values.values.len(),
        ));
    }
    Ok(())
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} unit: {}", self.function(), self.unit_id())
    }
}

pub(crate) struct CommandDisplay<'a> {
    level: AppDecodeLevel,
    command: &'a Command,
}

impl<'a> CommandDisplay<'a> {
    pub(crate) fn new(level: AppDecodeLevel, command: &'a Command) -> Self {
        Self { level, command }
    }
}

impl std::fmt::Display for CommandDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.command)?;

        if !self.level.data_headers() {
            return Ok(());
        }

        match self.command {
            Command::ReadCoils { range, .. }
            | Command::ReadDiscreteInputs { range, .. }
            | Command::ReadHoldingRegisters { range, .. }
            | Command::ReadInputRegisters { range, .. } => write!(f, " {range}"),
            Command::WriteSingleCoil { value, .. } => write!(f, " {value}"),
            Command::WriteSingleRegister { value, .. } => write!(f, " {value}"),
            Command::WriteMultipleCoils { values, .. } => {
                write!(f, " {}", values.range)?;
                if self.level.data_values() {
                    for (i, x) in values.values.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(values.range.start + i as u16, x))?;
                    }
                }
                Ok(())
            }
            Command::WriteMultipleRegisters { values, .. } => {
                write!(f, " {}", values.range)?;
                if self.level.data_values() {
                    for (i, x) in values.values.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(values.range.start + i as u16, x))?;
                    }
                }
                Ok(())
            }
        }
    }
}

pub(crate) struct ValuesDisplay<'a> {
    level: AppDecodeLevel,
    start: u16,
    values: Option<&'a Values>,
}

impl<'a> ValuesDisplay<'a> {
    pub(crate) fn new(level: AppDecodeLevel, start: u16, values: Option<&'a Values>) -> Self {
        Self {
            level,
            start,
            values,
        }
    }
}

impl std::fmt::Display for ValuesDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let values = match self.values {
            None => return f.write_str("write acknowledged"),
            Some(x) => x,
        };

        write!(f, "qty: {}", values.len())?;

        if self.level.data_values() {
            match values {
                Values::Bits(x) => {
                    for (i, v) in x.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(self.start.wrapping_add(i as u16), v))?;
                    }
                }
                Values::Registers(x) => {
                    for (i, v) in x.iter().enumerate() {
                        write!(f, "\n{}", Indexed::new(self.start.wrapping_add(i as u16), v))?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_constructors_enforce_limits() {
        assert!(Command::read_coils(UnitId::new(1), 0, 2000).is_ok());
        assert_eq!(
            Command::read_coils(UnitId::new(1), 0, 2001),
            Err(InvalidRequest::BadRange(
                InvalidRange::CountTooLargeForType(2001, 2000)
            ))
        );
        assert_eq!(
            Command::read_holding_registers(UnitId::new(1), 0, 126),
            Err(InvalidRequest::BadRange(
                InvalidRange::CountTooLargeForType(126, 125)
            ))
        );
        assert_eq!(
            Command::read_input_registers(UnitId::new(1), 0, 0),
            Err(InvalidRequest::BadRange(InvalidRange::CountOfZero))
        );
    }

    #[test]
    fn write_constructors_enforce_limits() {
        assert!(Command::write_multiple_registers(UnitId::new(1), 0, vec![0; 123]).is_ok());
        assert_eq!(
            Command::write_multiple_registers(UnitId::new(1), 0, vec![0; 124]),
            Err(InvalidRequest::BadRange(
                InvalidRange::CountTooLargeForType(124, 123)
            ))
        );
        assert_eq!(
            Command::write_multiple_coils(UnitId::new(1), 0, vec![true; 1969]),
            Err(InvalidRequest::BadRange(
                InvalidRange::CountTooLargeForType(1969, 1968)
            ))
        );
    }

    #[test]
    fn validate_catches_mismatched_value_count() {
        let command = Command::WriteMultipleRegisters {
            unit_id: UnitId::new(1),
            values: WriteMultiple {
                range: AddressRange { start: 0, count: 3 },
                values: vec![1, 2],
            },
        };
        assert_eq!(
            command.validate(),
            Err(InvalidRequest::ValueCountMismatch(3, 2))
        );
    }

    #[test]
    fn accessors_reflect_the_variant() {
        let command = Command::write_single_register(UnitId::new(5), 2300, 37);
        assert_eq!(command.unit_id(), UnitId::new(5));
        assert_eq!(command.start_address(), 2300);
        assert_eq!(command.function(), FunctionCode::WriteSingleRegister);
    }
}

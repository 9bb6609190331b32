//! Serial line (RTU) framing
//!
//! Only the framing is provided. Driving an actual serial port is left to the
//! caller, who can write the output of [`frame::format_adu`] to the port and
//! hand received frames to [`frame::parse_adu`].

/// RTU frame encoding and CRC validation
pub mod frame;

//! An implementation of the [Modbus](http://modbus.org/) protocol for RTU and TCP framing,
//! with a TCP client built on [Tokio](https://docs.rs/tokio).
//!
//! # Features
//!
//! * Codec for the eight common function codes, usable without the client
//! * RTU framing with CRC-16 validation and MBAP (TCP) framing
//! * Single-task TCP client with request/confirm (passive) or push (active) delivery
//! * Panic-free parsing
//! * Protocol decoding to the log via [tracing](https://docs.rs/tracing)
//!
//! # Supported Functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//!
//! # Example
//!
//! A passive client that reads a holding register
//!
//! ```no_run
//! use modlink::client::{spawn_tcp_client, ClientOptions};
//! use modlink::{Command, UnitId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, _notifications) = spawn_tcp_client(ClientOptions::new("127.0.0.1", 502));
//!     client.connect().await?;
//!
//!     client
//!         .request(Command::read_holding_registers(UnitId::new(5), 2300, 1)?)
//!         .await?;
//!     let values = client.confirmation().await?;
//!     println!("{values:?}");
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

/// TCP client
pub mod client;
/// application layer codec
pub mod codec;
/// protocol constants
pub mod constants;
/// RTU framing
pub mod serial;
/// TCP framing
pub mod tcp;

pub use crate::command::*;
pub use crate::common::frame::TxId;
pub use crate::common::function::FunctionCode;
pub use crate::common::phys::HexDisplay;
pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::*;
pub use crate::maybe_async::*;
pub use crate::types::*;

// internal modules
mod channel;
mod command;
mod common;
mod decode;
mod error;
mod exception;
mod maybe_async;
mod types;

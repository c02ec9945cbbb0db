//! Framing layer module for the Modbus client engine
//!
//! This crate provides the wire collaborators the client core is generic over:
//!
//! - [`SocketFramer`]: MBAP header framing used on TCP and UDP. Every frame
//!   carries a transaction id, so requests can be pipelined.
//! - [`AsciiFramer`]: `:`-delimited hex framing with an LRC check. There is
//!   no transaction id; all traffic shares the implicit slot.
//! - [`ModbusFramer`]: either of the above, chosen at runtime from a
//!   [`FramerKind`].

pub mod ascii;
pub mod kind;
pub mod lrc;
pub mod socket;
pub mod statistics;

pub use ascii::{AsciiFramer, MAX_ASCII_FRAME_LENGTH};
pub use kind::{FramerKind, ModbusFramer};
pub use lrc::LrcCalc;
pub use modbus_core::{ModbusError, ModbusResult};
pub use socket::{MBAP_HEADER_LENGTH, SocketFramer};
pub use statistics::FramerStatistics;

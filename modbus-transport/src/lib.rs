//! Transport layer module for the Modbus client engine
//!
//! This crate provides transport layer implementations for TCP and UDP.
//! Opening a transport yields independent read and write halves so a host
//! runtime can service both directions concurrently.

pub mod stream;
pub mod tcp;
pub mod udp;

pub use modbus_core::{ModbusError, ModbusResult};
pub use stream::{TransportLayer, TransportReader, TransportWriter};
#[cfg(feature = "mock")]
pub use stream::MockTransportWriter;
pub use tcp::{TcpReader, TcpSettings, TcpTransport, TcpWriter};
pub use udp::{UdpReader, UdpSettings, UdpTransport, UdpWriter};

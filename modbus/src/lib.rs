//! modbus_rs - Rust Modbus client engine
//!
//! Issues Modbus requests over a connection and matches each response to the
//! request that caused it, with many requests in flight and bytes arriving in
//! arbitrary chunks.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `modbus-core`: PDU types, transaction ids, framer contract, error handling
//! - `modbus-transport`: Transport layer (TCP, UDP)
//! - `modbus-framer`: Wire framings (MBAP socket, ASCII)
//! - `modbus-client`: Transaction correlation, runtime adapters, tokio driver
//!
//! # Usage
//!
//! ```no_run
//! use modbus::client::ClientBuilder;
//! use modbus::framer::FramerKind;
//!
//! # async fn run() -> modbus::ModbusResult<()> {
//! let client = ClientBuilder::new()
//!     .tcp("127.0.0.1:502")
//!     .framer(FramerKind::Socket)
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use modbus_core::{
    IdMode, ModbusError, ModbusRequest, ModbusResponse, ModbusResult, Pdu, TransactionId,
};

// Re-export client API
pub mod client {
    pub use modbus_client::*;
}

// Re-export framers
pub mod framer {
    pub use modbus_framer::*;
}

// Re-export transports
pub mod transport {
    pub use modbus_transport::*;
}

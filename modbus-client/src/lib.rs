//! Modbus client engine
//!
//! This crate lets callers issue Modbus requests over a connection and
//! receive the matching responses, even though bytes arrive in arbitrary
//! chunks, many requests may be in flight, and the connection may drop at any
//! time.
//!
//! # Layers
//!
//! - [`transaction`]: pending requests keyed by transaction id
//! - [`adapter`]: the seam between the core and a concurrency runtime
//! - [`protocol`]: the correlation core itself
//! - [`runtime`]: adapters for tokio and for plain `futures` channels, plus
//!   the tokio connection driver
//! - [`builder`]: configuration and a ready-made TCP/UDP client

pub mod adapter;
pub mod builder;
pub mod protocol;
pub mod runtime;
pub mod transaction;

pub use adapter::{ConnectionAdapter, ConnectionState, Promise};
pub use builder::{ClientBuilder, ClientConfig, ModbusClient, TransportKind};
pub use protocol::{ClientProtocol, ClientStatistics};
pub use runtime::channel::{ChannelAdapter, PendingReply};
pub use runtime::tokio::{ResponseFuture, TokioAdapter, TokioClient};
pub use transaction::TransactionRegistry;

//! Connection adapter abstraction
//!
//! The client core is written once and hosted by different concurrency
//! runtimes. Everything runtime specific sits behind [`ConnectionAdapter`]:
//!
//! - **Future primitive**: [`create`](ConnectionAdapter::create) returns a
//!   [`Promise`] (kept in the registry) and a `Deferred` (handed to the caller).
//! - **Write path**: [`write`](ConnectionAdapter::write) queues one encoded
//!   frame. An error here fails only the request being sent; failures that
//!   happen later on the wire arrive as a disconnect.
//!
//! In the other direction the host delivers exactly three events to the core:
//! `connection_made`, `connection_lost(reason)` and `data_received(bytes)`.
//!
//! # Single assignment
//! [`Promise::resolve`] and [`Promise::fail`] take `self` by value, so a
//! promise can be completed at most once. Dropping a promise without
//! completing it is allowed; the waiting side then observes
//! [`ModbusError::Cancelled`].

use bytes::Bytes;
use modbus_core::{ModbusError, ModbusResult};

/// Producer half of a single-assignment deferred result
pub trait Promise<R>: Send {
    /// Complete with a reply
    fn resolve(self, reply: R);

    /// Complete with an error
    fn fail(self, error: ModbusError);

    /// Whether the waiting side has gone away
    fn is_abandoned(&self) -> bool {
        false
    }
}

/// Runtime-specific shim between the client core and a transport
pub trait ConnectionAdapter<R>: Send {
    type Promise: Promise<R>;

    /// Consumer half returned to the caller of `execute`
    type Deferred;

    /// Create a linked promise/deferred pair
    fn create(&self) -> (Self::Promise, Self::Deferred);

    /// Queue one encoded frame for transmission
    ///
    /// # Errors
    /// Returns an error if the frame cannot be handed to the transport now
    fn write(&mut self, frame: Bytes) -> ModbusResult<()>;

    /// Create a deferred that has already failed
    fn failed(&self, error: ModbusError) -> Self::Deferred {
        let (promise, deferred) = self.create();
        promise.fail(error);
        deferred
    }
}

/// Connection state as seen by the client core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No usable connection (initial state)
    #[default]
    Disconnected,
    /// Connected; requests may be written
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

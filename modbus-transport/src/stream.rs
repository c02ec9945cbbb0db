//! Transport traits

use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult};
use std::future::Future;
use std::time::Duration;

/// Receiving half of an open transport
#[async_trait]
pub trait TransportReader: Send {
    /// Read the next delivery into `buf`
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if the peer closed the stream. A delivery
    /// may contain a partial frame or several frames.
    async fn read(&mut self, buf: &mut [u8]) -> ModbusResult<usize>;
}

/// Sending half of an open transport
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait TransportWriter: Send {
    /// Write a complete frame
    async fn write_all(&mut self, buf: &[u8]) -> ModbusResult<()>;

    /// Close the sending side
    async fn close(&mut self) -> ModbusResult<()>;
}

/// A transport that can be opened into a reader/writer pair
#[async_trait]
pub trait TransportLayer: Send {
    type Reader: TransportReader + 'static;
    type Writer: TransportWriter + 'static;

    /// Open the physical connection
    async fn open(self) -> ModbusResult<(Self::Reader, Self::Writer)>;
}

/// Run `operation`, failing with `Timeout` if it outlives `timeout`
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    operation: F,
) -> ModbusResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, operation)
            .await
            .map_err(|_| ModbusError::Timeout)?
            .map_err(ModbusError::Connection),
        None => operation.await.map_err(ModbusError::Connection),
    }
}

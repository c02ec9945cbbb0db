//! TCP transport implementation

use crate::stream::{TransportLayer, TransportReader, TransportWriter, with_timeout};
use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub connect_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            connect_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    settings: TcpSettings,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self { settings }
    }

    /// Create TCP transport from address string
    pub fn from_address(address: &str) -> ModbusResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ModbusError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    type Reader = TcpReader;
    type Writer = TcpWriter;

    async fn open(self) -> ModbusResult<(TcpReader, TcpWriter)> {
        let stream = with_timeout(
            self.settings.connect_timeout,
            TcpStream::connect(self.settings.address),
        )
        .await?;
        // Requests are small and latency bound
        stream.set_nodelay(true)?;
        log::debug!("TCP transport open to {}", self.settings.address);

        let (read_half, write_half) = stream.into_split();
        Ok((
            TcpReader { half: read_half },
            TcpWriter {
                half: write_half,
                write_timeout: self.settings.write_timeout,
            },
        ))
    }
}

/// Receiving half of a TCP connection
#[derive(Debug)]
pub struct TcpReader {
    half: OwnedReadHalf,
}

#[async_trait]
impl TransportReader for TcpReader {
    async fn read(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        self.half.read(buf).await.map_err(ModbusError::Connection)
    }
}

/// Sending half of a TCP connection
#[derive(Debug)]
pub struct TcpWriter {
    half: OwnedWriteHalf,
    write_timeout: Option<Duration>,
}

#[async_trait]
impl TransportWriter for TcpWriter {
    async fn write_all(&mut self, buf: &[u8]) -> ModbusResult<()> {
        with_timeout(self.write_timeout, self.half.write_all(buf)).await
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.half.shutdown().await.map_err(ModbusError::Connection)
    }
}

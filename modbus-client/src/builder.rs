//! Client configuration and builder
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use modbus_client::ClientBuilder;
//! use modbus_core::{ModbusRequest, Pdu};
//! use std::time::Duration;
//!
//! # async fn run() -> modbus_core::ModbusResult<()> {
//! let client = ClientBuilder::new()
//!     .tcp("192.168.1.100:502")
//!     .request_timeout(Duration::from_secs(3))
//!     .connect()
//!     .await?;
//!
//! let request = ModbusRequest::new(1, Pdu::new(0x03, vec![0x00, 0x00, 0x00, 0x02]));
//! let reply = client.execute(&request).await?;
//! # Ok(())
//! # }
//! ```

use crate::protocol::ClientStatistics;
use crate::runtime::tokio::TokioClient;
use modbus_core::{ModbusError, ModbusRequest, ModbusResponse, ModbusResult};
use modbus_framer::{FramerKind, ModbusFramer};
use modbus_transport::{TcpSettings, TcpTransport, UdpSettings, UdpTransport};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport and remote address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportKind {
    Tcp { address: SocketAddr },
    Udp { address: SocketAddr },
}

/// Everything needed to open a client connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub transport: TransportKind,
    #[serde(default)]
    pub framer: FramerKind,
    /// Bound on connection establishment and on each write
    #[serde(default)]
    pub connect_timeout: Option<Duration>,
    /// Default bound on waiting for a reply; `None` waits until disconnect
    #[serde(default)]
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Open a connection as configured
    pub async fn connect(&self) -> ModbusResult<ModbusClient> {
        let codec = self.framer.build();
        let inner = match self.transport {
            TransportKind::Tcp { address } => {
                let settings = TcpSettings {
                    address,
                    connect_timeout: self.connect_timeout,
                    write_timeout: self.connect_timeout,
                };
                TokioClient::connect(TcpTransport::new(settings), codec).await?
            }
            TransportKind::Udp { address } => {
                let mut settings = UdpSettings::new(address);
                settings.write_timeout = self.connect_timeout;
                TokioClient::connect(UdpTransport::new(settings), codec).await?
            }
        };
        log::info!("Modbus client connected via {:?}", self.transport);
        Ok(ModbusClient {
            inner,
            request_timeout: self.request_timeout,
        })
    }
}

/// Transport type configuration
#[derive(Debug, Clone)]
enum TransportType {
    Tcp { address: String },
    Udp { address: String },
    /// Not configured
    None,
}

/// Builder for [`ClientConfig`] and [`ModbusClient`]
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    transport_type: TransportType,
    framer: FramerKind,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Create a new builder with default settings
    ///
    /// # Default Settings
    /// - Framer: MBAP socket framing
    /// - Connect timeout: 30 seconds
    /// - Request timeout: none
    pub fn new() -> Self {
        Self {
            transport_type: TransportType::None,
            framer: FramerKind::Socket,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: None,
        }
    }

    /// Configure TCP transport, `address` in format "host:port"
    pub fn tcp(mut self, address: impl Into<String>) -> Self {
        self.transport_type = TransportType::Tcp {
            address: address.into(),
        };
        self
    }

    /// Configure UDP transport, `address` in format "host:port"
    pub fn udp(mut self, address: impl Into<String>) -> Self {
        self.transport_type = TransportType::Udp {
            address: address.into(),
        };
        self
    }

    pub fn framer(mut self, framer: FramerKind) -> Self {
        self.framer = framer;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validate the settings into a [`ClientConfig`]
    ///
    /// # Errors
    /// Returns `InvalidData` if no transport is configured or its address
    /// does not parse
    pub fn build(&self) -> ModbusResult<ClientConfig> {
        let transport = match &self.transport_type {
            TransportType::Tcp { address } => TransportKind::Tcp {
                address: parse_address(address)?,
            },
            TransportType::Udp { address } => TransportKind::Udp {
                address: parse_address(address)?,
            },
            TransportType::None => {
                return Err(ModbusError::InvalidData(
                    "Transport type not configured".to_string(),
                ));
            }
        };
        Ok(ClientConfig {
            transport,
            framer: self.framer,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        })
    }

    /// Build and open the connection
    pub async fn connect(&self) -> ModbusResult<ModbusClient> {
        self.build()?.connect().await
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_address(address: &str) -> ModbusResult<SocketAddr> {
    address
        .parse()
        .map_err(|e| ModbusError::InvalidData(format!("Invalid address {}: {}", address, e)))
}

/// Connected client using the configured framer and default timeout
pub struct ModbusClient {
    inner: TokioClient<ModbusFramer>,
    request_timeout: Option<Duration>,
}

impl ModbusClient {
    /// Send a request and wait for its reply, bounded by the request timeout
    pub async fn execute(&self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        match self.request_timeout {
            Some(timeout) => self.inner.execute_timeout(request, timeout).await,
            None => self.inner.execute(request).await,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    pub async fn statistics(&self) -> ClientStatistics {
        self.inner.statistics().await
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// The underlying tokio client
    pub fn inner(&self) -> &TokioClient<ModbusFramer> {
        &self.inner
    }

    pub async fn close(&self) {
        self.inner.close().await;
    }
}

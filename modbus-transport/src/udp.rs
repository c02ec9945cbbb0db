//! UDP transport implementation

use crate::stream::{TransportLayer, TransportReader, TransportWriter, with_timeout};
use async_trait::async_trait;
use modbus_core::{ModbusError, ModbusResult};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

/// UDP transport layer settings
#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub remote_address: SocketAddr,
    /// Local bind address; an ephemeral port on the unspecified address if unset
    pub local_address: Option<SocketAddr>,
    pub write_timeout: Option<Duration>,
}

impl UdpSettings {
    /// Create new UDP settings
    pub fn new(remote_address: SocketAddr) -> Self {
        Self {
            remote_address,
            local_address: None,
            write_timeout: Some(Duration::from_secs(30)),
        }
    }

    fn bind_address(&self) -> SocketAddr {
        self.local_address.unwrap_or_else(|| match self.remote_address.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        })
    }
}

/// UDP transport layer implementation
///
/// Each received datagram is one delivery. The socket is connected to the
/// remote address, so datagrams from other peers are filtered by the OS.
#[derive(Debug)]
pub struct UdpTransport {
    settings: UdpSettings,
}

impl UdpTransport {
    /// Create a new UDP transport layer
    pub fn new(settings: UdpSettings) -> Self {
        Self { settings }
    }

    /// Create UDP transport from address string
    pub fn from_address(address: &str) -> ModbusResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ModbusError::InvalidData(format!("Invalid UDP address: {}", e)))?;
        Ok(Self::new(UdpSettings::new(addr)))
    }

    pub fn settings(&self) -> &UdpSettings {
        &self.settings
    }
}

#[async_trait]
impl TransportLayer for UdpTransport {
    type Reader = UdpReader;
    type Writer = UdpWriter;

    async fn open(self) -> ModbusResult<(UdpReader, UdpWriter)> {
        let socket = UdpSocket::bind(self.settings.bind_address()).await?;
        socket.connect(self.settings.remote_address).await?;
        log::debug!(
            "UDP transport bound to {} for {}",
            socket.local_addr()?,
            self.settings.remote_address
        );

        let socket = Arc::new(socket);
        Ok((
            UdpReader {
                socket: socket.clone(),
            },
            UdpWriter {
                socket,
                write_timeout: self.settings.write_timeout,
            },
        ))
    }
}

/// Receiving half of a UDP association
#[derive(Debug)]
pub struct UdpReader {
    socket: Arc<UdpSocket>,
}

#[async_trait]
impl TransportReader for UdpReader {
    async fn read(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        loop {
            let n = self.socket.recv(buf).await?;
            // An empty datagram would read as EOF
            if n > 0 {
                return Ok(n);
            }
        }
    }
}

/// Sending half of a UDP association
#[derive(Debug)]
pub struct UdpWriter {
    socket: Arc<UdpSocket>,
    write_timeout: Option<Duration>,
}

#[async_trait]
impl TransportWriter for UdpWriter {
    async fn write_all(&mut self, buf: &[u8]) -> ModbusResult<()> {
        let sent = with_timeout(self.write_timeout, self.socket.send(buf)).await?;
        if sent != buf.len() {
            return Err(ModbusError::Connection(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("Datagram truncated: sent {} of {} bytes", sent, buf.len()),
            )));
        }
        Ok(())
    }

    async fn close(&mut self) -> ModbusResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address_follows_remote_family() {
        let v4 = UdpSettings::new("10.0.0.1:502".parse().unwrap());
        assert!(v4.bind_address().is_ipv4());
        let v6 = UdpSettings::new("[::1]:502".parse().unwrap());
        assert!(v6.bind_address().is_ipv6());
    }

    #[tokio::test]
    async fn test_datagram_exchange() -> anyhow::Result<()> {
        let server = UdpSocket::bind("127.0.0.1:0").await?;
        let address = server.local_addr()?;

        let (mut reader, mut writer) = UdpTransport::new(UdpSettings::new(address)).open().await?;
        writer.write_all(&[0xAA, 0xBB]).await?;

        let mut buf = [0u8; 16];
        let (n, peer) = server.recv_from(&mut buf).await?;
        assert_eq!(&buf[..n], &[0xAA, 0xBB]);
        server.send_to(&[0xCC], peer).await?;

        let n = reader.read(&mut buf).await?;
        assert_eq!(&buf[..n], &[0xCC]);
        Ok(())
    }
}

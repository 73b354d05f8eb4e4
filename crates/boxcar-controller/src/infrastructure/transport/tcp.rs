//! TCP transport to a serial bridge.
//!
//! The vehicle's radio link is a serial port (Bluetooth SPP).  On the host it
//! is reached through a serial-to-TCP bridge, so the controller only needs a
//! byte stream to `host:port`.
//!
//! Reads are non-blocking: bytes are pulled from the socket with `try_read`
//! into a pending buffer, and [`Transport::wait_for_data`] parks on
//! `TcpStream::readable` until the socket has something.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, info, warn};

use crate::application::transport::{Transport, TransportError};

/// Size of one socket read.
const READ_CHUNK: usize = 256;

pub struct TcpTransport {
    address: String,
    stream: Option<TcpStream>,
    pending: Vec<u8>,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stream: None,
            pending: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Moves whatever the socket has right now into `pending`.
    ///
    /// Drops the stream when the peer has shut down, and returns `Closed`
    /// if that left nothing to read.
    fn fill_pending(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(TransportError::NotConnected);
        };
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    warn!("{} closed the connection", self.address);
                    self.stream = None;
                    if self.pending.is_empty() {
                        return Err(TransportError::Closed);
                    }
                    return Ok(());
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let target = lookup_host(self.address.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| TransportError::LinkNotFound(self.address.clone()))?;

        let stream =
            TcpStream::connect(target)
                .await
                .map_err(|source| TransportError::LinkConnectFailed {
                    target: self.address.clone(),
                    source,
                })?;
        stream.set_nodelay(true)?;
        info!("connected to vehicle bridge at {target}");

        self.pending.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("socket shutdown: {e}");
            }
        }
        self.pending.clear();
        Ok(())
    }

    fn is_data_available(&mut self) -> bool {
        if self.pending.is_empty() && self.stream.is_some() {
            if let Err(e) = self.fill_pending() {
                debug!("poll for inbound data failed: {e}");
                // Report "available" so the next read surfaces the error.
                return true;
            }
        }
        !self.pending.is_empty()
    }

    async fn wait_for_data(&mut self) -> Result<(), TransportError> {
        loop {
            if !self.pending.is_empty() {
                return Ok(());
            }
            let Some(stream) = self.stream.as_ref() else {
                return Err(TransportError::Closed);
            };
            stream.readable().await?;
            self.fill_pending()?;
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.pending.is_empty() {
            match self.stream {
                Some(_) => self.fill_pending()?,
                None => return Err(TransportError::Closed),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        stream.write_all(bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_round_trip_against_local_bridge() {
        // Arrange – a fake bridge that greets, reads one command and acks
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bridge = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hello").await.unwrap();
            let mut cmd = [0u8; 1];
            socket.read_exact(&mut cmd).await.unwrap();
            socket.write_all(&[0x01]).await.unwrap();
            cmd[0]
        });
        let mut transport = TcpTransport::new(addr.to_string());

        // Act
        transport.connect().await.unwrap();
        transport.wait_for_data().await.unwrap();
        let mut buf = [0u8; 16];
        let greeting_len = transport.read(&mut buf).unwrap();
        transport.write(&[0x03]).await.unwrap();
        transport.wait_for_data().await.unwrap();
        let reply_len = transport.read(&mut buf).unwrap();

        // Assert
        assert_eq!(greeting_len, 5);
        assert_eq!(reply_len, 1);
        assert_eq!(buf[0], 0x01);
        assert_eq!(bridge.await.unwrap(), 0x03);
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });
        let mut transport = TcpTransport::new(addr.to_string());
        transport.connect().await.unwrap();

        let result = transport.wait_for_data().await;

        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_bytes_sent_before_close_are_delivered_first() {
        // Arrange – the bridge sends an ack and hangs up straight away
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bridge = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[0x01]).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        let mut transport = TcpTransport::new(addr.to_string());
        transport.connect().await.unwrap();
        bridge.await.unwrap();
        // Let the byte and the close both reach the local socket.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let mut buf = [0u8; 16];

        // Act
        let waited = transport.wait_for_data().await;
        let first = transport.read(&mut buf);
        let second = transport.read(&mut buf);

        // Assert
        assert!(waited.is_ok());
        assert!(!transport.is_connected(), "close was seen with the byte");
        assert_eq!(first.unwrap(), 1);
        assert_eq!(buf[0], 0x01);
        assert!(matches!(second, Err(TransportError::Closed)));
        assert!(matches!(
            transport.wait_for_data().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_link_not_found() {
        let mut transport = TcpTransport::new("not a valid address");

        let result = transport.connect().await;

        assert!(matches!(result, Err(TransportError::LinkNotFound(_))));
    }

    #[tokio::test]
    async fn test_write_while_disconnected_fails() {
        let mut transport = TcpTransport::new("127.0.0.1:9");

        let result = transport.write(&[0x00]).await;

        assert!(matches!(result, Err(TransportError::NotConnected)));
    }
}

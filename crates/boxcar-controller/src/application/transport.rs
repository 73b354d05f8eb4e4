//! The byte-stream port the protocol engine drives.
//!
//! A [`Transport`] is a connected, ordered, reliable byte stream to the
//! vehicle.  The production implementation is a TCP socket to a serial bridge
//! (`infrastructure::transport::tcp`); tests and `--simulate` use an in-memory
//! vehicle (`infrastructure::transport::simulated`).
//!
//! The engine owns its transport exclusively (behind its command lock), so
//! every method takes `&mut self` and implementations need no internal
//! locking.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The vehicle could not be located (e.g. the address did not resolve).
    #[error("vehicle link not found: {0}")]
    LinkNotFound(String),

    /// The vehicle was found but the connection could not be established.
    #[error("failed to connect to {target}: {source}")]
    LinkConnectFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation that needs a connection was called while disconnected.
    #[error("transport is not connected")]
    NotConnected,

    /// The remote side closed the stream.
    #[error("connection closed by vehicle")]
    Closed,

    /// An I/O error occurred on an established connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connected byte stream to the vehicle.
#[async_trait]
pub trait Transport: Send {
    /// Whether the stream is currently connected.
    fn is_connected(&self) -> bool;

    /// Opens the stream.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Closes the stream.  Closing an already closed stream is not an error.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Non-blocking check whether [`read`](Self::read) would return data.
    fn is_data_available(&mut self) -> bool;

    /// Resolves once data is available to [`read`](Self::read).
    ///
    /// Callers bound this with `tokio::time::timeout`.  Returns
    /// [`TransportError::Closed`] if the stream ends while waiting.
    async fn wait_for_data(&mut self) -> Result<(), TransportError>;

    /// Copies available bytes into `buf` without waiting and returns how many
    /// were copied (zero when nothing is available).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes all of `bytes` to the stream.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

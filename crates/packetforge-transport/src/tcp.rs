//! TCP transport built on `tokio::net::TcpListener`.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::{SocketOptions, Transport, TransportError};

/// A TCP [`Transport`] that listens for incoming connections.
///
/// Dropping the transport closes the listener.
pub struct TcpTransport {
    listener: TcpListener,
    options: SocketOptions,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(
        addr: &str,
        options: SocketOptions,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::BindFailed {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self { listener, options })
    }

    /// Returns the options applied to accepted streams.
    pub fn options(&self) -> &SocketOptions {
        &self.options
    }
}

impl Transport for TcpTransport {
    type Connection = TcpStream;

    async fn accept(&self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        // A socket that refuses an option is still usable.
        if let Err(e) = self.options.apply(&stream) {
            tracing::debug!(%addr, error = %e, "failed to apply socket options");
        }

        tracing::debug!(%addr, "accepted TCP connection");
        Ok(stream)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Socket)
    }
}

//! Transport abstraction layer for packetforge.
//!
//! Provides the [`Transport`] and [`Connection`] traits that decouple the
//! session machinery from the concrete byte stream it runs on. The session
//! layer only needs two things from a connection: a read half for its read
//! loop and a write half for its write loop.
//!
//! - [`TcpTransport`]: a TCP listener that applies [`SocketOptions`] to
//!   every accepted stream.
//! - `Connection` is implemented for [`TcpStream`] and for in-memory
//!   [`DuplexStream`]s, which is what the session tests run on.

mod error;
mod options;
mod tcp;

pub use error::TransportError;
pub use options::SocketOptions;
pub use tcp::TcpTransport;

use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// A bidirectional byte stream that can be split into independently owned
/// halves.
///
/// Dropping both halves closes the connection.
pub trait Connection: Send + 'static {
    /// The read half, owned by a session's read loop.
    type Reader: AsyncRead + Unpin + Send + 'static;
    /// The write half, owned by a session's write loop.
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// Human-readable `[local >>> remote]` description used in logs.
    fn describe(&self) -> String;

    /// Splits the connection into its read and write halves.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}

impl Connection for TcpStream {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    fn describe(&self) -> String {
        match (self.local_addr(), self.peer_addr()) {
            (Ok(local), Ok(peer)) => format!("[{local} >>> {peer}]"),
            _ => "[unknown >>> unknown]".to_string(),
        }
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        TcpStream::into_split(self)
    }
}

impl Connection for DuplexStream {
    type Reader = ReadHalf<DuplexStream>;
    type Writer = WriteHalf<DuplexStream>;

    fn describe(&self) -> String {
        "[duplex >>> duplex]".to_string()
    }

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        tokio::io::split(self)
    }
}

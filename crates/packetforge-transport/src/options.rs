//! Per-connection socket options.

use serde::Deserialize;
use socket2::SockRef;
use tokio::net::TcpStream;

/// Default socket buffer size hint: 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Socket options applied to every accepted TCP stream.
///
/// The buffer sizes are hints. The operating system may round or clamp
/// them, and a value of `0` leaves the platform default in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SocketOptions {
    /// Disable Nagle's algorithm. Default: true.
    pub tcp_nodelay: bool,
    /// `SO_RCVBUF` hint in bytes. Default: 1 MiB.
    pub read_buffer_size: usize,
    /// `SO_SNDBUF` hint in bytes. Default: 1 MiB.
    pub write_buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl SocketOptions {
    /// Applies the options to a connected stream.
    pub fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nodelay(self.tcp_nodelay)?;

        let sock_ref = SockRef::from(stream);
        if self.read_buffer_size > 0 {
            sock_ref.set_recv_buffer_size(self.read_buffer_size)?;
        }
        if self.write_buffer_size > 0 {
            sock_ref.set_send_buffer_size(self.write_buffer_size)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let opts = SocketOptions::default();
        assert!(opts.tcp_nodelay);
        assert_eq!(opts.read_buffer_size, 1024 * 1024);
        assert_eq!(opts.write_buffer_size, 1024 * 1024);
    }

    #[test]
    fn test_deserialize_partial_keeps_defaults() {
        let opts: SocketOptions =
            serde_json::from_str(r#"{ "tcp_nodelay": false }"#).unwrap();
        assert!(!opts.tcp_nodelay);
        assert_eq!(opts.read_buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_apply_sets_nodelay() {
        let (_client, server) = connected_pair().await;
        SocketOptions::default().apply(&server).unwrap();
        assert!(server.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_apply_with_zero_sizes_keeps_platform_defaults() {
        let (_client, server) = connected_pair().await;
        let before = SockRef::from(&server).recv_buffer_size().unwrap();

        let opts = SocketOptions {
            tcp_nodelay: false,
            read_buffer_size: 0,
            write_buffer_size: 0,
        };
        opts.apply(&server).unwrap();

        assert!(!server.nodelay().unwrap());
        assert_eq!(SockRef::from(&server).recv_buffer_size().unwrap(), before);
    }
}

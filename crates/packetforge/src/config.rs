//! Server configuration.

use std::time::Duration;

use packetforge_session::SessionConfig;
use packetforge_transport::SocketOptions;
use serde::Deserialize;

/// Everything a [`TcpServer`](crate::TcpServer) needs besides its handler.
///
/// Every field has a default, so a config file only lists what it changes:
///
/// ```rust
/// use packetforge::ServerConfig;
///
/// let config: ServerConfig = serde_json::from_str(
///     r#"{ "listen_addr": "0.0.0.0:9000", "session": { "outbound_capacity": 32 } }"#,
/// )
/// .unwrap();
/// assert_eq!(config.listen_addr, "0.0.0.0:9000");
/// assert_eq!(config.session.outbound_capacity, 32);
/// assert!(config.socket.tcp_nodelay);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:8080`.
    pub listen_addr: String,
    /// Options applied to every accepted stream.
    pub socket: SocketOptions,
    /// Queue sizes for every session.
    pub session: SessionConfig,
    /// Pause before the accept loop is restarted after a failure.
    /// Default: 100 ms.
    pub accept_retry_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            socket: SocketOptions::default(),
            session: SessionConfig::default(),
            accept_retry_delay_ms: 100,
        }
    }
}

impl ServerConfig {
    /// The accept retry delay as a [`Duration`].
    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }
}

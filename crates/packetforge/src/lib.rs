//! # packetforge
//!
//! A length-prefixed TCP session framework.
//!
//! A [`TcpServer`] accepts connections and turns each one into a
//! [`Session`] with its own bounded inbound and outbound queues. Frames on
//! the wire are a big-endian `u32` length followed by that many payload
//! bytes; the application sees them as [`Packet`]s through the
//! [`SessionHandler`] callbacks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use packetforge::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl SessionHandler for Echo {
//!     async fn on_packet(&self, session: &Arc<Session>, packet: &mut Packet) {
//!         let mut reply = session.pool().acquire();
//!         reply.write_slice(packet.readable_slice());
//!         session.send(reply).await;
//!     }
//! }
//!
//! # async fn run() -> Result<(), PacketforgeError> {
//! let server = TcpServer::builder()
//!     .bind("127.0.0.1:9000")
//!     .handler(Arc::new(Echo))
//!     .build();
//! server.start().await?;
//! // ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod handler;
mod logging;
mod server;

pub use config::ServerConfig;
pub use error::PacketforgeError;
pub use logging::{DEFAULT_FILTER, default_env_filter, init_tracing};
pub use server::{ServerState, TcpServer, TcpServerBuilder};

pub use packetforge_protocol::{BufferPool, MAX_FRAME_LEN, MIN_FRAME_LEN, Packet, ProtocolError};
pub use packetforge_session::{
    Session, SessionConfig, SessionError, SessionHandler, SessionId, SessionRegistry,
    SessionState, async_trait,
};
pub use packetforge_transport::{SocketOptions, TransportError};

/// Everything an application usually needs.
pub mod prelude {
    pub use crate::{
        BufferPool, Packet, PacketforgeError, ServerConfig, ServerState, Session,
        SessionConfig, SessionError, SessionHandler, SessionId, TcpServer, TcpServerBuilder,
        async_trait,
    };
}

//! Per-connection sessions for packetforge.
//!
//! This crate turns an accepted connection into a running session:
//!
//! 1. **Sessions** ([`Session`]): a read loop, a write loop and a
//!    dispatch loop around two bounded packet queues
//! 2. **Handler contract** ([`SessionHandler`]): the application's
//!    `on_open` / `on_packet` / `on_close` callbacks
//! 3. **Registry** ([`SessionRegistry`]): every live session by key, for
//!    lookups from outside the session
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← accepts connections, registers and serves sessions
//!     ↕
//! Session Layer (this crate)  ← per-connection loops and handler calls
//!     ↕
//! Protocol Layer (below)  ← Packet, BufferPool, read_frame / write_frame
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod session;

pub use async_trait::async_trait;
pub use config::{DEFAULT_QUEUE_CAPACITY, SessionConfig};
pub use error::SessionError;
pub use handler::SessionHandler;
pub use registry::SessionRegistry;
pub use session::{Session, SessionId, SessionState};

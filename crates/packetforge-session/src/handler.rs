//! The event-handler contract between sessions and the application.
//!
//! packetforge doesn't know what a packet means. The application
//! implements [`SessionHandler`] and the session calls it at three points
//! of its lifecycle:
//!
//! ```text
//! accept ──→ on_open ──→ on_packet (0..n, in wire order) ──→ on_close
//!               │                                             ↑
//!               └──────────── Err(_) ────────────────────────┘
//! ```
//!
//! The server wraps the application handler in its own pass-through
//! handler that also keeps the session registry up to date, so the same
//! trait is implemented by both.

use std::sync::Arc;

use async_trait::async_trait;
use packetforge_protocol::Packet;

use crate::{Session, SessionError};

/// Receives lifecycle events for sessions.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one handler instance is shared by every
///   session and called from whichever runtime thread drives that session.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use packetforge_protocol::Packet;
/// use packetforge_session::{Session, SessionHandler, async_trait};
///
/// /// Echoes every packet back to its sender.
/// struct Echo;
///
/// #[async_trait]
/// impl SessionHandler for Echo {
///     async fn on_packet(&self, session: &Arc<Session>, packet: &mut Packet) {
///         let mut reply = session.pool().acquire();
///         reply.write_slice(packet.readable_slice());
///         session.send(reply).await;
///     }
/// }
/// ```
#[async_trait]
pub trait SessionHandler: Send + Sync + 'static {
    /// Called once before the session starts serving.
    ///
    /// Returning an error closes the session without starting its read and
    /// write loops. `on_close` still runs.
    async fn on_open(&self, _session: &Arc<Session>) -> Result<(), SessionError> {
        Ok(())
    }

    /// Called once per decoded packet, in the order packets arrived.
    ///
    /// The packet is borrowed: it goes back to the pool as soon as this
    /// returns. Copy out whatever must outlive the call. A panic here is
    /// caught and closes only this session.
    async fn on_packet(&self, session: &Arc<Session>, packet: &mut Packet);

    /// Called exactly once when the session closes.
    async fn on_close(&self, _session: &Arc<Session>) {}
}

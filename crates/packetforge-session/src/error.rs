//! Error types for the session layer.

/// Errors that can end a session before or while it serves.
///
/// I/O and framing failures are not listed here: they close the session
/// from inside its loops and are only logged.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The handler refused the session in
    /// [`on_open`](crate::SessionHandler::on_open).
    #[error("session rejected: {0}")]
    Rejected(String),

    /// A handler callback panicked. The panic was contained to this
    /// session.
    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

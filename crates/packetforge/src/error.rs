//! Unified error type for packetforge.

use packetforge_protocol::ProtocolError;
use packetforge_session::SessionError;
use packetforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `packetforge` crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates `From` impls, so the `?` operator
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PacketforgeError {
    /// A transport-level error (bind, accept, socket options).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (frame length, decode, I/O).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (open refused, handler panic).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// [`TcpServer::start`](crate::TcpServer::start) was called on a server
    /// that had already been started.
    #[error("server already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::AcceptFailed(std::io::Error::other("gone"));
        let err: PacketforgeError = err.into();
        assert!(matches!(err, PacketforgeError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::FrameLength {
            len: 0,
            min: 1,
            max: 9999,
        };
        let err: PacketforgeError = err.into();
        assert!(matches!(err, PacketforgeError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Rejected("nope".into());
        let err: PacketforgeError = err.into();
        assert!(matches!(err, PacketforgeError::Session(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_already_started_message() {
        assert_eq!(
            PacketforgeError::AlreadyStarted.to_string(),
            "server already started"
        );
    }
}

//! Error types for the protocol layer.
//!
//! Framing errors and payload decoding errors share one enum: both mean the
//! bytes in hand do not match what the protocol expects, and both end with
//! the owning session closing the connection.

/// Errors that can occur while framing or decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame declared a length outside the accepted range.
    ///
    /// On the read side this means the stream is corrupt or hostile and the
    /// connection must be closed. No buffer is allocated for the declared
    /// length.
    #[error("illegal frame length {len} (accepted {min}..={max})")]
    FrameLength {
        /// The offending length.
        len: u64,
        /// Smallest accepted length.
        min: u32,
        /// Largest accepted length.
        max: u32,
    },

    /// A read asked for more bytes than the packet holds.
    #[error("packet underflow: needed {needed} bytes, {available} available")]
    Underflow {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left between the read and write cursors.
        available: usize,
    },

    /// A string field was malformed (zero count or invalid UTF-8).
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// The peer closed the connection cleanly between two frames.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Reading or writing the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Wire protocol for packetforge.
//!
//! This crate defines what travels on a connection and how:
//!
//! - **Packets** ([`Packet`]): in-memory byte buffers with read/write
//!   cursors and big-endian primitive encoders.
//! - **Pooling** ([`BufferPool`]): recycles packet buffers between frames.
//! - **Framing** ([`read_frame`], [`write_frame`]): the 4-byte length
//!   prefix that delimits packets on a byte stream.
//! - **Errors** ([`ProtocolError`]): what can go wrong along the way.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw byte streams) and
//! session (per-connection loops). It has no notion of connections; it
//! only turns bytes into packets and back.
//!
//! ```text
//! Transport (bytes) → Protocol (Packet) → Session (handler callbacks)
//! ```

mod error;
mod frame;
mod packet;
mod pool;

pub use error::ProtocolError;
pub use frame::{FRAME_HEADER_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN, read_frame, write_frame};
pub use packet::Packet;
pub use pool::{BufferPool, MAX_POOLED_BUFFER_SIZE};

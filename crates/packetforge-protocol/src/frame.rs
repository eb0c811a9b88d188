//! Length-prefixed framing for byte streams.
//!
//! Every packet on the wire is a frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 big-endian    |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does not include the prefix itself and must lie in
//! [`MIN_FRAME_LEN`]`..=`[`MAX_FRAME_LEN`]. Anything else means the stream
//! is out of sync or hostile, and the connection is closed.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{BufferPool, Packet, ProtocolError};

/// Smallest accepted payload length.
pub const MIN_FRAME_LEN: u32 = 1;

/// Largest accepted payload length.
pub const MAX_FRAME_LEN: u32 = 9999;

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

fn check_len(len: u64) -> Result<(), ProtocolError> {
    if len < u64::from(MIN_FRAME_LEN) || len > u64::from(MAX_FRAME_LEN) {
        return Err(ProtocolError::FrameLength {
            len,
            min: MIN_FRAME_LEN,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(())
}

/// Reads one frame and returns its payload as a packet from `pool`.
///
/// A clean EOF before the first header byte yields
/// [`ProtocolError::ConnectionClosed`]; EOF part way through the header is
/// [`ProtocolError::Io`]. The declared length is validated
/// before a buffer is acquired. Short reads are retried until the payload
/// is complete.
pub async fn read_frame<R>(
    reader: &mut R,
    pool: &BufferPool,
) -> Result<Packet, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    // EOF inside the header is a truncated frame, not a clean close.
    reader.read_exact(&mut header[first..]).await?;

    let len = u32::from_be_bytes(header);
    check_len(u64::from(len))?;

    let mut packet = pool.acquire();
    let buf = packet.buffer_mut();
    buf.resize(len as usize, 0);
    // On error the packet drops here and its buffer goes back to the pool.
    reader.read_exact(buf).await?;

    Ok(packet)
}

/// Writes the packet's readable bytes as one frame and flushes.
///
/// The packet is consumed and released whether or not the write succeeds.
/// A packet whose readable length is outside the accepted range is refused
/// before anything is written.
pub async fn write_frame<W>(
    writer: &mut W,
    packet: Packet,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let payload = packet.readable_slice();
    check_len(payload.len() as u64)?;

    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

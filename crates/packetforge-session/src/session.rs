//! A session: one connection, three loops, two bounded queues.
//!
//! ```text
//!            ┌──────────── read loop ───────────┐
//!  socket ──→│ read_frame → inbound queue (100) │──→ dispatch loop ──→ on_packet
//!            └──────────────────────────────────┘         │
//!                                                         ▼
//!            ┌──────────── write loop ──────────┐   Session::send
//!  socket ←──│ write_frame ← outbound queue (100)│←───────┘
//!            └──────────────────────────────────┘
//! ```
//!
//! The dispatch loop runs inside [`Session::serve`]; the read and write
//! loops are spawned tasks. Every loop watches the session's cancellation
//! token. Closing cancels the token, which makes the read and write loops
//! drop their halves of the connection, closing the socket.
//!
//! # Lifecycle
//!
//! ```text
//!   Open ──(on_open ok)──→ Serving ──(close)──→ Closing ──→ Closed
//!     │                                            ↑
//!     └──────────────(on_open err)─────────────────┘
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use futures_util::FutureExt;
use packetforge_protocol::{BufferPool, Packet, ProtocolError, read_frame, write_frame};
use packetforge_transport::Connection;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::{SessionConfig, SessionError, SessionHandler};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Numeric session identifier, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a `SessionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, `on_open` not yet accepted.
    Open = 0,
    /// Read, write and dispatch loops are running.
    Serving = 1,
    /// Close in progress: connection dropped, `on_close` and draining.
    Closing = 2,
    /// Fully closed. Sends are released immediately.
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Serving,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The live state of one accepted connection.
///
/// Always handled through an `Arc`: the dispatch loop, both I/O loops, the
/// registry and the handler all hold references.
pub struct Session {
    id: SessionId,
    key: String,
    peer: String,
    handler: Arc<dyn SessionHandler>,
    pool: BufferPool,

    inbound_tx: mpsc::Sender<Packet>,
    inbound_rx: Mutex<mpsc::Receiver<Packet>>,
    outbound_tx: mpsc::Sender<Packet>,
    outbound_rx: Mutex<mpsc::Receiver<Packet>>,

    state: AtomicU8,
    /// One-time close guard. Set by the first `close` call.
    closed: AtomicBool,
    cancel: CancellationToken,
    tasks: TaskTracker,

    handled_packets: AtomicU64,
    last_recv: StdMutex<Option<Instant>>,
    created_at: Instant,
}

impl Session {
    /// Creates a session that is ready to [`serve`](Self::serve) a
    /// connection.
    ///
    /// `cancel` is usually a child of a server-wide token, so cancelling
    /// the parent closes every session at once.
    pub fn new(
        id: SessionId,
        peer: impl Into<String>,
        handler: Arc<dyn SessionHandler>,
        pool: BufferPool,
        config: &SessionConfig,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let config = config.clone().validated();
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        Arc::new(Self {
            id,
            key: id.to_string(),
            peer: peer.into(),
            handler,
            pool,
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
            state: AtomicU8::new(SessionState::Open as u8),
            closed: AtomicBool::new(false),
            cancel,
            tasks: TaskTracker::new(),
            handled_packets: AtomicU64::new(0),
            last_recv: StdMutex::new(None),
            created_at: Instant::now(),
        })
    }

    // -- Accessors -------------------------------------------------------

    /// Numeric identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// String form of the identifier, used as the registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `[local >>> remote]` description of the connection.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// The pool reply packets should be acquired from.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Packets delivered to the handler so far.
    pub fn handled_packets(&self) -> u64 {
        self.handled_packets.load(Ordering::Relaxed)
    }

    /// When the read loop last queued a packet.
    pub fn last_recv(&self) -> Option<Instant> {
        self.last_recv.lock().ok().and_then(|t| *t)
    }

    /// When the session was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Packets waiting for the dispatch loop.
    pub fn inbound_len(&self) -> usize {
        self.inbound_tx.max_capacity() - self.inbound_tx.capacity()
    }

    /// Packets waiting for the write loop.
    pub fn outbound_len(&self) -> usize {
        self.outbound_tx.max_capacity() - self.outbound_tx.capacity()
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    // -- Sending ---------------------------------------------------------

    /// Queues a packet for the write loop.
    ///
    /// Waits while the outbound queue is full. If the session is closed or
    /// cancelled, or becomes so while this call waits, the packet is
    /// released and the call returns without an error.
    pub async fn send(&self, packet: Packet) {
        if self.is_closed() || self.cancel.is_cancelled() {
            packet.release();
            return;
        }
        // A cancelled session's write loop is gone and never frees room in
        // the queue. Dropping the pending send releases the packet.
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            sent = self.outbound_tx.send(packet) => {
                if let Err(mpsc::error::SendError(packet)) = sent {
                    packet.release();
                }
            }
        }
    }

    // -- Serving ---------------------------------------------------------

    /// Serves `conn` until the session closes.
    ///
    /// Calls `on_open`; if the handler refuses (or panics) the session is
    /// closed without entering its loops and the refusal is returned.
    /// Otherwise spawns the read and write loops, runs the dispatch loop
    /// on the calling task, and closes the session when dispatch ends.
    /// I/O and protocol failures end the session but are not returned.
    pub async fn serve<C: Connection>(self: Arc<Self>, conn: C) -> Result<(), SessionError> {
        let opened = AssertUnwindSafe(self.handler.on_open(&self))
            .catch_unwind()
            .await;
        let refusal = match opened {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::debug!(session = %self, error = %e, "session refused by handler");
                Some(e)
            }
            Err(panic) => {
                let msg = panic_message(&*panic);
                tracing::error!(session = %self, panic = %msg, "on_open panicked");
                Some(SessionError::HandlerPanicked(msg))
            }
        };
        if let Some(e) = refusal {
            drop(conn);
            self.close().await;
            return Err(e);
        }
        // Closed while on_open ran.
        if self
            .state
            .compare_exchange(
                SessionState::Open as u8,
                SessionState::Serving as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }
        tracing::debug!(session = %self, "session serving");

        let (reader, writer) = conn.into_split();
        let (err_tx, err_rx) = oneshot::channel();
        self.tasks.spawn(read_loop(Arc::clone(&self), reader, err_tx));
        self.tasks.spawn(write_loop(Arc::clone(&self), writer));

        self.dispatch_loop(err_rx).await;
        self.close().await;
        Ok(())
    }

    /// Delivers inbound packets to the handler until cancellation, a read
    /// failure, or a handler panic.
    async fn dispatch_loop(self: &Arc<Self>, mut read_err: oneshot::Receiver<ProtocolError>) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(session = %self, "dispatch cancelled");
                    return;
                }
                packet = self.next_inbound() => {
                    let Some(packet) = packet else { return };
                    if !self.dispatch(packet).await {
                        return;
                    }
                }
                err = &mut read_err => {
                    match err {
                        Ok(ProtocolError::ConnectionClosed) => {
                            tracing::debug!(session = %self, "peer closed connection");
                        }
                        Ok(e @ ProtocolError::FrameLength { .. }) => {
                            tracing::warn!(session = %self, error = %e, "protocol violation, closing");
                        }
                        Ok(e) => {
                            tracing::debug!(session = %self, error = %e, "read failed");
                        }
                        Err(_) => {}
                    }
                    return;
                }
            }
        }
    }

    /// Hands one packet to the handler and releases it. Returns `false` if
    /// the handler panicked.
    async fn dispatch(self: &Arc<Self>, mut packet: Packet) -> bool {
        let outcome = AssertUnwindSafe(self.handler.on_packet(self, &mut packet))
            .catch_unwind()
            .await;
        packet.release();

        match outcome {
            Ok(()) => {
                self.handled_packets.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(panic) => {
                tracing::error!(
                    session = %self,
                    panic = %panic_message(&*panic),
                    "handler panicked, closing session"
                );
                false
            }
        }
    }

    async fn next_inbound(&self) -> Option<Packet> {
        self.inbound_rx.lock().await.recv().await
    }

    async fn next_outbound(&self) -> Option<Packet> {
        self.outbound_rx.lock().await.recv().await
    }

    fn touch_recv(&self) {
        if let Ok(mut last) = self.last_recv.lock() {
            *last = Some(Instant::now());
        }
    }

    // -- Closing ---------------------------------------------------------

    /// Closes the session. Only the first call has any effect.
    ///
    /// Cancels the loops (which drops the connection), calls `on_close`
    /// once, releases every packet still queued in either direction and
    /// marks the session [`Closed`](SessionState::Closed).
    pub async fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.set_state(SessionState::Closing);
        self.cancel.cancel();

        if let Err(panic) = AssertUnwindSafe(self.handler.on_close(self))
            .catch_unwind()
            .await
        {
            tracing::error!(session = %self, panic = %panic_message(&*panic), "on_close panicked");
        }

        let released = self.drain().await;
        self.set_state(SessionState::Closed);
        self.tasks.close();

        tracing::info!(
            session = %self,
            handled = self.handled_packets(),
            released,
            "session closed"
        );
    }

    /// Closes both queues and releases whatever they still hold.
    async fn drain(&self) -> usize {
        let mut released = 0;
        for queue in [&self.outbound_rx, &self.inbound_rx] {
            let mut rx = queue.lock().await;
            rx.close();
            while let Ok(packet) = rx.try_recv() {
                packet.release();
                released += 1;
            }
        }
        released
    }

    /// Waits until the session is closed and its read and write loops have
    /// exited.
    pub async fn wait(&self) {
        self.tasks.wait().await;
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.id, self.peer)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .field("inbound", &self.inbound_len())
            .field("outbound", &self.outbound_len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// I/O loops
// ---------------------------------------------------------------------------

/// Decodes frames into the inbound queue. Reports the first failure on
/// `err_tx` and exits.
async fn read_loop<R>(session: Arc<Session>, mut reader: R, err_tx: oneshot::Sender<ProtocolError>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return,
            frame = read_frame(&mut reader, &session.pool) => frame,
        };
        match frame {
            Ok(packet) => {
                let queued = tokio::select! {
                    biased;
                    _ = session.cancel.cancelled() => return,
                    queued = session.inbound_tx.send(packet) => queued,
                };
                if queued.is_err() {
                    return;
                }
                session.touch_recv();
            }
            Err(e) => {
                let _ = err_tx.send(e);
                return;
            }
        }
    }
}

/// Encodes queued packets onto the connection. A failed write cancels the
/// session.
async fn write_loop<W>(session: Arc<Session>, mut writer: W)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let packet = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return,
            packet = session.next_outbound() => packet,
        };
        let Some(packet) = packet else { return };

        let written = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return,
            written = write_frame(&mut writer, packet) => written,
        };
        if let Err(e) = written {
            tracing::debug!(session = %session, error = %e, "write failed");
            session.cancel.cancel();
            return;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

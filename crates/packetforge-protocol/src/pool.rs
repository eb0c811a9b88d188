//! Buffer pool backing every [`Packet`].
//!
//! Sessions acquire a packet per received frame and per reply, so buffers
//! are recycled instead of reallocated. The pool is a mutex-guarded free
//! list; the critical sections are a single `push` or `pop`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::Packet;

/// Buffers whose capacity grew beyond this are freed instead of pooled.
pub const MAX_POOLED_BUFFER_SIZE: usize = 16 * 1024;

/// Capacity of a freshly allocated buffer.
const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Default cap on idle buffers kept by a pool.
const DEFAULT_MAX_IDLE: usize = 1024;

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    in_use: AtomicUsize,
    max_idle: usize,
}

/// Thread-safe pool of packet buffers.
///
/// Cloning is cheap: clones share the same free list.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Creates a pool with `prealloc` buffers ready to hand out.
    pub fn new(prealloc: usize) -> Self {
        Self::with_max_idle(prealloc, DEFAULT_MAX_IDLE.max(prealloc))
    }

    /// Creates a pool that keeps at most `max_idle` idle buffers.
    pub fn with_max_idle(prealloc: usize, max_idle: usize) -> Self {
        let free = (0..prealloc.min(max_idle))
            .map(|_| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY))
            .collect();
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                in_use: AtomicUsize::new(0),
                max_idle,
            }),
        }
    }

    /// Acquires an empty packet backed by a pooled buffer.
    pub fn acquire(&self) -> Packet {
        let buf = match self.inner.free.lock() {
            Ok(mut free) => free.pop(),
            Err(_) => None,
        }
        .unwrap_or_else(|| Vec::with_capacity(DEFAULT_BUFFER_CAPACITY));

        self.inner.in_use.fetch_add(1, Ordering::AcqRel);
        Packet::pooled(buf, self.clone())
    }

    /// Number of idle buffers currently in the pool.
    pub fn available(&self) -> usize {
        self.inner.free.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Number of packets acquired from this pool and not yet released.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Takes a buffer back from a released packet.
    pub(crate) fn recycle(&self, mut buf: Vec<u8>) {
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);

        if buf.capacity() > MAX_POOLED_BUFFER_SIZE {
            return;
        }
        buf.clear();
        if let Ok(mut free) = self.inner.free.lock() {
            if free.len() < self.inner.max_idle {
                free.push(buf);
            }
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("in_use", &self.in_use())
            .finish()
    }
}

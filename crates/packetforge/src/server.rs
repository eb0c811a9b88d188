//! `TcpServer` builder and accept loop.
//!
//! This is the entry point for running a packetforge server. It ties the
//! layers together: transport → protocol → session.
//!
//! # Task layout
//!
//! ```text
//! start() ──→ supervisor ──→ accept loop ──→ session task (per connection)
//!                 ↑              │
//!                 └── restart ───┘ (accept error or panic, unless stopping)
//! ```
//!
//! Two cancellation tokens drive shutdown. `stop` ends the supervisor and
//! the accept loop, which closes the listener. `sessions` is the parent of
//! every session's token; cancelling it closes all live sessions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use packetforge_protocol::BufferPool;
use packetforge_session::{Session, SessionConfig, SessionHandler, SessionRegistry};
use packetforge_transport::{Connection, SocketOptions, TcpTransport, Transport, TransportError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::handler::ServerHandler;
use crate::{PacketforgeError, ServerConfig};

/// Lifecycle state of a [`TcpServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerState {
    /// Built, not yet started.
    Created = 0,
    /// Accepting connections.
    Listening = 1,
    /// `stop` in progress.
    Stopping = 2,
    /// Listener closed.
    Stopped = 3,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Listening,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Builder for configuring a [`TcpServer`].
///
/// # Example
///
/// ```rust,no_run
/// use packetforge::prelude::*;
///
/// # async fn run(handler: std::sync::Arc<dyn SessionHandler>) -> Result<(), PacketforgeError> {
/// let server = TcpServer::builder()
///     .bind("0.0.0.0:9000")
///     .handler(handler)
///     .build();
/// let addr = server.start().await?;
/// println!("listening on {addr}");
/// # Ok(())
/// # }
/// ```
pub struct TcpServerBuilder {
    config: ServerConfig,
    handler: Option<Arc<dyn SessionHandler>>,
}

impl TcpServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            handler: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.listen_addr = addr.to_string();
        self
    }

    /// Sets the options applied to accepted streams.
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.config.socket = options;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Sets the application handler. Without one, sessions are accepted
    /// and every packet is dropped.
    pub fn handler(mut self, handler: Arc<dyn SessionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Builds the server. Nothing is bound until [`TcpServer::start`].
    pub fn build(self) -> TcpServer {
        TcpServer::with_handler(self.config, self.handler)
    }
}

impl Default for TcpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state reachable from the supervisor, the accept loop and the
/// server handle.
struct Inner {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    handler: Arc<ServerHandler>,
    pool: BufferPool,
    state: AtomicU8,
    stop: CancellationToken,
    sessions: CancellationToken,
    session_tasks: TaskTracker,
}

/// A TCP server that turns each accepted connection into a [`Session`].
pub struct TcpServer {
    inner: Arc<Inner>,
    local_addr: OnceLock<SocketAddr>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServer {
    /// Creates a new builder.
    pub fn builder() -> TcpServerBuilder {
        TcpServerBuilder::new()
    }

    /// Creates a server from `config` with no application handler.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_handler(config, None)
    }

    fn with_handler(config: ServerConfig, app: Option<Arc<dyn SessionHandler>>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let handler = Arc::new(ServerHandler::new(app, Arc::clone(&registry)));
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                handler,
                pool: BufferPool::default(),
                state: AtomicU8::new(ServerState::Created as u8),
                stop: CancellationToken::new(),
                sessions: CancellationToken::new(),
                session_tasks: TaskTracker::new(),
            }),
            local_addr: OnceLock::new(),
            supervisor: Mutex::new(None),
        }
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the bound address, which is the real port when the config
    /// asked for port 0.
    ///
    /// # Errors
    /// - [`PacketforgeError::AlreadyStarted`] if called more than once.
    /// - [`PacketforgeError::Transport`] if the address cannot be bound.
    ///   The server stays in [`ServerState::Created`] and may be started
    ///   again.
    pub async fn start(&self) -> Result<SocketAddr, PacketforgeError> {
        // Holding the lock serializes concurrent start and stop calls.
        let mut supervisor = self.supervisor.lock().await;
        if self.state() != ServerState::Created || supervisor.is_some() {
            return Err(PacketforgeError::AlreadyStarted);
        }

        let config = &self.inner.config;
        let transport = TcpTransport::bind(&config.listen_addr, config.socket.clone()).await?;
        let addr = transport.local_addr()?;
        let _ = self.local_addr.set(addr);

        self.inner.set_state(ServerState::Listening);
        *supervisor = Some(tokio::spawn(supervise(Arc::clone(&self.inner), transport)));

        tracing::info!(%addr, "tcp server started");
        Ok(addr)
    }

    /// Stops accepting connections and waits until the listener is closed.
    ///
    /// Sessions that are already established keep running; see
    /// [`shutdown_sessions`](Self::shutdown_sessions). Calling `stop` again,
    /// or on a server that never started, does nothing.
    pub async fn stop(&self) {
        let mut supervisor = self.supervisor.lock().await;
        match self.state() {
            ServerState::Created => {
                self.inner.set_state(ServerState::Stopped);
                return;
            }
            ServerState::Stopped => return,
            ServerState::Listening | ServerState::Stopping => {}
        }

        self.inner.set_state(ServerState::Stopping);
        self.inner.stop.cancel();
        if let Some(handle) = supervisor.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "supervisor task failed");
            }
        }
        self.inner.set_state(ServerState::Stopped);

        tracing::info!(addr = ?self.local_addr(), "tcp server stopped");
    }

    /// Closes every live session and waits for their tasks to finish.
    ///
    /// Connections accepted afterwards are closed as soon as they are
    /// opened, so this is normally paired with [`stop`](Self::stop).
    pub async fn shutdown_sessions(&self) {
        let live = self.inner.registry.len();
        self.inner.sessions.cancel();
        self.inner.session_tasks.close();
        self.inner.session_tasks.wait().await;
        self.inner.session_tasks.reopen();
        tracing::info!(sessions = live, "sessions shut down");
    }

    /// Looks up a live session by key.
    pub fn get_session(&self, key: &str) -> Option<Arc<Session>> {
        self.inner.registry.get(key)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The registry of live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    /// The bound address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        ServerState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }
}

impl Default for TcpServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("addr", &self.local_addr())
            .field("state", &self.state())
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl Inner {
    fn set_state(&self, state: ServerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Wraps an accepted stream into a registered session and serves it on
    /// its own task.
    fn spawn_session<C: Connection>(&self, conn: C) {
        let session = Session::new(
            self.registry.next_id(),
            conn.describe(),
            Arc::clone(&self.handler) as Arc<dyn SessionHandler>,
            self.pool.clone(),
            &self.config.session,
            self.sessions.child_token(),
        );
        self.registry.set(session.key(), Arc::clone(&session));
        tracing::debug!(session = %session, "connection accepted");

        self.session_tasks.spawn(async move {
            let label = session.to_string();
            if let Err(e) = session.serve(conn).await {
                tracing::debug!(session = %label, error = %e, "session ended before serving");
            }
        });
    }
}

/// Keeps an accept loop running until stop is requested.
///
/// Owns the transport, so the listener closes when this returns.
async fn supervise<T: Transport>(inner: Arc<Inner>, transport: T) {
    let transport = Arc::new(transport);
    loop {
        let run = tokio::spawn(accept_loop(Arc::clone(&inner), Arc::clone(&transport)));
        let outcome = run.await;
        if inner.stop.is_cancelled() {
            break;
        }
        match outcome {
            Ok(Ok(())) => break,
            Ok(Err(e)) => tracing::warn!(error = %e, "accept loop failed, restarting"),
            Err(e) if e.is_panic() => tracing::error!("accept loop panicked, restarting"),
            Err(_) => break,
        }

        tokio::select! {
            _ = inner.stop.cancelled() => break,
            _ = tokio::time::sleep(inner.config.accept_retry_delay()) => {}
        }
    }
    drop(transport);
    tracing::debug!("listener closed");
}

/// Accepts connections until stop is requested or accepting fails.
async fn accept_loop<T: Transport>(
    inner: Arc<Inner>,
    transport: Arc<T>,
) -> Result<(), TransportError> {
    loop {
        let conn = tokio::select! {
            biased;
            _ = inner.stop.cancelled() => return Ok(()),
            conn = transport.accept() => conn?,
        };
        inner.spawn_session(conn);
    }
}

//! The server's pass-through session handler.
//!
//! Every session the server creates is handed a [`ServerHandler`], not the
//! application handler directly. It forwards each callback to the
//! application handler (if one was configured) and keeps the registry in
//! step: when a session closes it is removed before the application hears
//! about it.

use std::sync::Arc;

use async_trait::async_trait;
use packetforge_protocol::Packet;
use packetforge_session::{Session, SessionError, SessionHandler, SessionRegistry};

pub(crate) struct ServerHandler {
    app: Option<Arc<dyn SessionHandler>>,
    registry: Arc<SessionRegistry>,
}

impl ServerHandler {
    pub(crate) fn new(
        app: Option<Arc<dyn SessionHandler>>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self { app, registry }
    }
}

#[async_trait]
impl SessionHandler for ServerHandler {
    async fn on_open(&self, session: &Arc<Session>) -> Result<(), SessionError> {
        match &self.app {
            Some(app) => app.on_open(session).await,
            None => Ok(()),
        }
    }

    async fn on_packet(&self, session: &Arc<Session>, packet: &mut Packet) {
        if let Some(app) = &self.app {
            app.on_packet(session, packet).await;
        }
    }

    async fn on_close(&self, session: &Arc<Session>) {
        self.registry.remove(session.key());
        if let Some(app) = &self.app {
            app.on_close(session).await;
        }
    }
}

use std::sync::Arc;

use packetforge::prelude::*;

const DEFAULT_ADDR: &str = "0.0.0.0:9999";

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Logs every connection and echoes each packet back to its sender.
struct DemoServer;

#[async_trait]
impl SessionHandler for DemoServer {
    async fn on_open(&self, session: &Arc<Session>) -> Result<(), SessionError> {
        tracing::info!(session = %session.key(), peer = %session.peer(), "new connection");
        Ok(())
    }

    async fn on_packet(&self, session: &Arc<Session>, packet: &mut Packet) {
        tracing::debug!(
            session = %session.key(),
            bytes = packet.readable_bytes(),
            "packet received"
        );
        let mut reply = session.pool().acquire();
        reply.write_slice(packet.readable_slice());
        session.send(reply).await;
    }

    async fn on_close(&self, session: &Arc<Session>) {
        tracing::info!(
            session = %session.key(),
            handled = session.handled_packets(),
            "connection closed"
        );
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), PacketforgeError> {
    packetforge::init_tracing();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let server = TcpServer::builder()
        .bind(&addr)
        .handler(Arc::new(DemoServer))
        .build();

    let bound = server.start().await?;
    tracing::info!(%bound, "echo server ready, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
    }

    server.stop().await;
    server.shutdown_sessions().await;
    Ok(())
}

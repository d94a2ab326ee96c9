//! Per-connection handler: registration, frame decoding and outbound
//! delivery.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`], plus a writer task that drains the connection's
//! outbound channel onto the socket and pings the client between events.
//! The flow is:
//!   1. Register with the coordinator (queues for matchmaking)
//!   2. Loop: receive frames → decode → dispatch to the coordinator
//!   3. On close, error or idle timeout: report the disconnect
//!
//! Pongs reset the idle timeout, so a client waiting quietly in the queue
//! stays connected as long as its socket answers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use wingduel_lobby::CoordinatorHandle;
use wingduel_protocol::{ClientEvent, Codec, JsonCodec, ServerEvent};
use wingduel_transport::{Connection, ConnectionId, Frame, WebSocketConnection};

use crate::WingduelError;
use crate::server::ServerState;

/// Reports the disconnect when the handler exits, including by panic.
///
/// `Drop` is synchronous, so the report goes out on a spawned task.
struct DisconnectGuard {
    connection: ConnectionId,
    coordinator: CoordinatorHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let connection = self.connection;
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let _ = coordinator.disconnect(connection).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), WingduelError> {
    let conn = Arc::new(conn);
    let connection = conn.id();
    tracing::debug!(%connection, peer = %conn.peer_addr(), "handling new connection");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_outbound(
        Arc::clone(&conn),
        outbound_rx,
        state.codec,
        state.heartbeat_interval,
    ));

    state.coordinator.connect(connection, outbound_tx).await?;
    let _guard = DisconnectGuard {
        connection,
        coordinator: state.coordinator.clone(),
    };

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(Frame::Data(data)))) => data,
            Ok(Ok(Some(Frame::Heartbeat))) => continue,
            Ok(Ok(None)) => {
                tracing::debug!(%connection, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%connection, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%connection, "connection idle, dropping");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%connection, error = %e, "dropping malformed frame");
                continue;
            }
        };

        if state.coordinator.dispatch(connection, event).await.is_err() {
            tracing::debug!(%connection, "coordinator gone, closing connection");
            break;
        }
    }

    // _guard drops here → disconnect is reported.
    Ok(())
}

/// Writes every event sent to this connection, in order, and pings the
/// client every `heartbeat` in between. Ends, closing the socket, once the
/// coordinator releases the channel.
async fn write_outbound(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
    codec: JsonCodec,
    heartbeat: Duration,
) {
    let connection = conn.id();
    let mut pings = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    pings.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else { break };
                let data = match codec.encode(&event) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(%connection, error = %e, "failed to encode outbound event");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&data).await {
                    tracing::debug!(%connection, error = %e, "send failed");
                    break;
                }
            }
            _ = pings.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%connection, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    let _ = conn.close().await;
}

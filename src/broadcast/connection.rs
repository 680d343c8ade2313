//! Per-connection send path for display clients.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::registry::ClientHandle;
use super::scheduler::BroadcastScheduler;
use crate::snapshot::SnapshotSource;

/// Protocol-level keepalive; display clients never see it as a payload.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Drive one upgraded socket until either side closes it.
///
/// Frames produced by the scheduler are written in order. When the writer
/// fails, the outbound channel closes and the next fan-out evicts the client.
/// A writer that stops draining fills its bounded queue and is evicted the
/// same way. Either way the client is unregistered here once the socket is done.
pub async fn handle_display_socket<S: SnapshotSource>(
    socket: WebSocket,
    scheduler: BroadcastScheduler<S>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut rx) = ClientHandle::channel();
    let client_id = handle.id();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(PING_INTERVAL);
        heartbeat.tick().await;
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if sender.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client = %client_id, "Sent heartbeat ping");
                }
            }
        }
        let _ = sender.close().await;
    });

    scheduler.register(handle).await;

    // Display clients have nothing to say; only a close matters.
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::trace!(client = %client_id, len = text.len(), "Ignoring inbound text");
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {},
                Err(e) => {
                    tracing::debug!(client = %client_id, error = %e, "Socket read error");
                    break;
                },
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    scheduler.unregister(client_id).await;
}

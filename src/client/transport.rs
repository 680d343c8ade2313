use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{RelayError, Result};

/// Inbound text payloads of one open connection. The stream ends when the
/// peer closes; an `Err` item means the connection failed.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Opens one connection to a relay. The connection manager only ever sees
/// this seam, so tests can script opens and closes.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &str) -> impl Future<Output = Result<MessageStream>> + Send;
}

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<MessageStream> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to connect to {}: {}", url, e)))?;

        tracing::debug!("Connected to relay at {}", url);

        let stream = futures_util::stream::unfold(ws_stream, |mut ws| async move {
            loop {
                match ws.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text), ws)),
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "Relay closed connection");
                        return None;
                    },
                    // Pings are answered by tungstenite itself
                    Ok(_) => continue,
                    Err(e) => return Some((Err(RelayError::Transport(e.to_string())), ws)),
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

//! Common utilities for integration tests

#![allow(dead_code)] // Not every test binary uses every helper

use assert_cmd::Command;
use futures_util::StreamExt;
use signage_relay::config::ServerConfig;
use signage_relay::db::models::Snapshot;
use signage_relay::server::RelayServer;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Create a Command for `signage` isolated from the real home directory and
/// pointed at `db`.
pub fn signage_command(home: &Path, db: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_signage"));
    cmd.env("HOME", home)
        .env("SIGNAGE_DB_PATH", db)
        .env_remove("RUST_LOG");
    cmd
}

/// A `ws://` URL on a localhost port nothing listens on.
pub fn unreachable_ws_url() -> String {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    format!("ws://127.0.0.1:{}/ws", port)
}

/// A relay serving on an ephemeral localhost port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    _temp_dir: TempDir,
}

impl TestRelay {
    pub async fn start(interval: Duration) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("relay.db");
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            db_path: db_path.clone(),
            broadcast_interval: interval,
        };

        let bound = RelayServer::new(config).bind().await.unwrap();
        let addr = bound.local_addr();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(bound.serve(async {
            rx.await.ok();
        }));

        Self {
            addr,
            db_path,
            shutdown: Some(tx),
            _temp_dir: temp_dir,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connect(&self) -> WsClient {
        let (ws, _) = connect_async(self.ws_url()).await.unwrap();
        ws
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Next text frame, skipping control frames. Panics after `within`.
pub async fn next_text(ws: &mut WsClient, within: Duration) -> String {
    tokio::time::timeout(within, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text,
                Some(Ok(_)) => continue,
                other => panic!("socket ended: {:?}", other),
            }
        }
    })
    .await
    .expect("no frame in time")
}

pub async fn next_snapshot(ws: &mut WsClient, within: Duration) -> Snapshot {
    serde_json::from_str(&next_text(ws, within).await).unwrap()
}

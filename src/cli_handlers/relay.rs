use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::utils::{open_store, print_json};
use crate::client::{
    ClientConnectionManager, ConnectionState, DisplayState, ReconnectPolicy, WsTransport,
};
use crate::config::{ClientConfig, ServerConfig};
use crate::error::{RelayError, Result};
use crate::server::RelayServer;
use crate::snapshot::SnapshotAssembler;

pub async fn handle_serve(
    db: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    interval_ms: Option<u64>,
) -> Result<()> {
    let config = ServerConfig::resolve(host, port, db, interval_ms)?;
    RelayServer::new(config).run().await?;
    Ok(())
}

pub async fn handle_snapshot(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db).await?;
    let snapshot = SnapshotAssembler::new(store).assemble().await?;
    print_json(&snapshot)
}

/// Behave like a display: follow the relay, keep local display state and
/// log mode / standby transitions until Ctrl-C.
pub async fn handle_watch(
    url: Option<String>,
    reconnect_delay_ms: Option<u64>,
    reconnect_attempts: Option<u32>,
) -> Result<()> {
    let config = ClientConfig::resolve(url, reconnect_delay_ms, reconnect_attempts)?;

    let (tx, mut snapshots) = mpsc::unbounded_channel();
    let manager = ClientConnectionManager::new(
        config.url.clone(),
        WsTransport,
        ReconnectPolicy::from(&config),
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
    );
    let mut states = manager.subscribe();
    let mut display_state = DisplayState::new();
    let mut ever_connected = false;
    let mut initial_failures = 0u32;

    let retry = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(retry);
    let mut retry_pending = false;

    manager.connect().await;

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.recv() => {
                let change = display_state.apply(snapshot, Local::now().naive_local());
                if change.mode_changed {
                    let mode = display_state.mode_name().unwrap_or_default();
                    tracing::info!(mode, "Display mode changed");
                }
                if change.standby_changed {
                    let standby = display_state.standby().is_standby;
                    tracing::info!(standby, "Standby state changed");
                }
            }
            () = &mut retry, if retry_pending => {
                retry_pending = false;
                manager.connect().await;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::debug!(?state, "Connection state");
                match state {
                    ConnectionState::Connected => {
                        ever_connected = true;
                        initial_failures = 0;
                    },
                    // The manager leaves first-connection retries to us
                    ConnectionState::Disconnected if !ever_connected => {
                        initial_failures += 1;
                        if initial_failures > config.reconnect_attempts {
                            return Err(RelayError::Transport(format!(
                                "Could not reach {} after {} attempts",
                                config.url, initial_failures
                            )));
                        }
                        tracing::info!(
                            attempt = initial_failures,
                            "Relay not reachable yet, retrying in {:?}",
                            config.reconnect_delay
                        );
                        retry.as_mut().reset(Instant::now() + config.reconnect_delay);
                        retry_pending = true;
                    },
                    ConnectionState::Disconnected => {
                        display_state.clear_standby();
                        tracing::warn!("Relay lost, display falls back to active");
                        return Err(RelayError::Transport(format!(
                            "Gave up reconnecting to {}",
                            config.url
                        )));
                    },
                    ConnectionState::Connecting | ConnectionState::Reconnecting => {},
                }
            }
            _ = tokio::signal::ctrl_c() => {
                manager.disconnect().await;
                break;
            }
        }
    }

    Ok(())
}

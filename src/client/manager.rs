//! Consumer-side connection lifecycle.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (Closed | Errored) -> Reconnecting -> Connecting ...
//! ```
//!
//! Every socket runs in a session task tagged with a generation number.
//! Tearing a session down bumps the generation and aborts the task, so the
//! old socket can never report back. There is at most one pending reconnect
//! timer, identified by a token that a late firing must still match.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::transport::Transport;
use crate::config::ClientConfig;
use crate::db::models::Snapshot;
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events that drive the state machine.
#[derive(Debug)]
enum ConnectionEvent {
    Opened,
    Closed,
    Errored(RelayError),
    ManualDisconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ReconnectPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            delay: config.reconnect_delay,
            max_attempts: config.reconnect_attempts,
        }
    }
}

pub type MessageHandler = Arc<dyn Fn(Snapshot) + Send + Sync>;

struct ManagerState {
    phase: ConnectionState,
    session: Option<JoinHandle<()>>,
    reconnect_timer: Option<(u64, JoinHandle<()>)>,
    next_timer_token: u64,
    attempts: u32,
    ever_connected: bool,
}

struct Inner<T> {
    url: String,
    transport: Arc<T>,
    policy: ReconnectPolicy,
    on_message: MessageHandler,
    generation: AtomicU64,
    state: Mutex<ManagerState>,
    phase_tx: watch::Sender<ConnectionState>,
}

/// Owns one logical connection to one URL. Not meant to be shared between
/// independent consumers; each gets its own manager.
pub struct ClientConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> ClientConnectionManager<T> {
    pub fn new(
        url: impl Into<String>,
        transport: T,
        policy: ReconnectPolicy,
        on_message: impl Fn(Snapshot) + Send + Sync + 'static,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                transport: Arc::new(transport),
                policy,
                on_message: Arc::new(on_message),
                generation: AtomicU64::new(0),
                state: Mutex::new(ManagerState {
                    phase: ConnectionState::Disconnected,
                    session: None,
                    reconnect_timer: None,
                    next_timer_token: 0,
                    attempts: 0,
                    ever_connected: false,
                }),
                phase_tx,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.phase_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.phase_tx.subscribe()
    }

    /// Open the connection. A no-op while connected; otherwise any stale
    /// socket and pending retry are dropped first. Resets the retry budget.
    pub async fn connect(&self) {
        let mut state = self.inner.state.lock().await;
        if state.phase == ConnectionState::Connected {
            tracing::debug!(url = %self.inner.url, "Already connected");
            return;
        }
        Inner::<T>::cancel_reconnect(&mut state);
        state.attempts = 0;
        crate::log_client_operation!("connect", self.inner.url);
        Inner::start_session(&self.inner, &mut state);
    }

    /// Close the connection without triggering a reconnect.
    pub async fn disconnect(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner
            .apply(&mut state, ConnectionEvent::ManualDisconnect);
    }
}

impl<T: Transport> Inner<T> {
    fn set_phase(&self, state: &mut ManagerState, phase: ConnectionState) {
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Detach and abort the current session, if any.
    fn teardown(&self, state: &mut ManagerState) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(session) = state.session.take() {
            session.abort();
        }
    }

    fn cancel_reconnect(state: &mut ManagerState) {
        if let Some((_, timer)) = state.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn start_session(inner: &Arc<Self>, state: &mut ManagerState) {
        inner.teardown(state);
        let generation = inner.generation.load(Ordering::Acquire);
        inner.set_phase(state, ConnectionState::Connecting);

        let weak = Arc::downgrade(inner);
        let transport = Arc::clone(&inner.transport);
        let url = inner.url.clone();
        state.session = Some(tokio::spawn(run_session(weak, transport, url, generation)));
    }

    fn schedule_reconnect(inner: &Arc<Self>, state: &mut ManagerState) {
        Self::cancel_reconnect(state);
        let token = state.next_timer_token;
        state.next_timer_token += 1;

        let weak = Arc::downgrade(inner);
        let delay = inner.policy.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(token).await;
            }
        });
        state.reconnect_timer = Some((token, timer));
        inner.set_phase(state, ConnectionState::Reconnecting);

        tracing::info!(
            url = %inner.url,
            attempt = state.attempts + 1,
            max_attempts = inner.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );
    }

    async fn fire_reconnect(self: Arc<Self>, token: u64) {
        let mut state = self.state.lock().await;
        match state.reconnect_timer {
            Some((current, _)) if current == token => {},
            _ => return,
        }
        // Dropping our own handle does not abort this task
        state.reconnect_timer = None;
        state.attempts += 1;
        crate::log_client_operation!(
            "reconnect",
            self.url,
            format!("attempt {}/{}", state.attempts, self.policy.max_attempts)
        );
        Self::start_session(&self, &mut state);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    /// Feed a session event through the state machine. Events from a
    /// torn-down session are dropped. Returns whether it was applied.
    async fn dispatch(self: &Arc<Self>, generation: u64, event: ConnectionEvent) -> bool {
        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            tracing::trace!(?event, "Ignoring event from stale session");
            return false;
        }
        self.apply(&mut state, event);
        true
    }

    fn apply(self: &Arc<Self>, state: &mut ManagerState, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                state.attempts = 0;
                state.ever_connected = true;
                Self::cancel_reconnect(state);
                self.set_phase(state, ConnectionState::Connected);
                crate::log_client_operation!("connected", self.url);
            },
            ConnectionEvent::Closed | ConnectionEvent::Errored(_) => {
                match &event {
                    ConnectionEvent::Errored(e) => {
                        tracing::warn!(url = %self.url, error = %e, "Connection failed")
                    },
                    _ => tracing::info!(url = %self.url, "Connection closed"),
                }
                // The session task is exiting on its own
                state.session = None;
                self.generation.fetch_add(1, Ordering::AcqRel);

                if !state.ever_connected {
                    self.set_phase(state, ConnectionState::Disconnected);
                } else if state.attempts < self.policy.max_attempts {
                    Self::schedule_reconnect(self, state);
                } else {
                    tracing::warn!(
                        url = %self.url,
                        attempts = state.attempts,
                        "Reconnect limit reached, giving up until connect() is called"
                    );
                    self.set_phase(state, ConnectionState::Disconnected);
                }
            },
            ConnectionEvent::ManualDisconnect => {
                Self::cancel_reconnect(state);
                self.teardown(state);
                self.set_phase(state, ConnectionState::Disconnected);
                crate::log_client_operation!("disconnect", self.url);
            },
        }
    }

    fn deliver(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }
        match serde_json::from_str::<Snapshot>(text) {
            Ok(snapshot) => (self.on_message)(snapshot),
            Err(e) => tracing::warn!(error = %e, "Dropping malformed snapshot payload"),
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(session) = state.session.take() {
            session.abort();
        }
        if let Some((_, timer)) = state.reconnect_timer.take() {
            timer.abort();
        }
    }
}

/// One socket from open to close. Holds only a weak reference to the
/// manager so dropping the manager ends it.
async fn run_session<T: Transport>(
    weak: Weak<Inner<T>>,
    transport: Arc<T>,
    url: String,
    generation: u64,
) {
    let opened = transport.open(&url).await;

    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            inner.dispatch(generation, ConnectionEvent::Errored(e)).await;
            return;
        },
    };
    if !inner.dispatch(generation, ConnectionEvent::Opened).await {
        return;
    }
    drop(inner);

    while let Some(item) = stream.next().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match item {
            Ok(text) => inner.deliver(generation, &text),
            Err(e) => {
                inner.dispatch(generation, ConnectionEvent::Errored(e)).await;
                return;
            },
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.dispatch(generation, ConnectionEvent::Closed).await;
    }
}

//! Periodic snapshot broadcast, active only while clients are connected.
//!
//! The scheduler owns the client registry and a cancellable timer. The timer
//! starts when the registry goes from zero to one client and is aborted when
//! it goes back to zero. Each tick starts at most one cycle: a tick that
//! fires while the previous cycle is still assembling is skipped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::registry::{ClientHandle, ClientId, ClientRegistry, Frame};
use crate::db::models::Snapshot;
use crate::snapshot::SnapshotSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No clients, no timer
    Idle,
    /// Timer running
    Active,
}

/// Result of one assemble-then-fan-out cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frame handed to `delivered` clients; `evicted` clients failed.
    Delivered { delivered: usize, evicted: usize },
    /// Registry was empty once the snapshot was ready.
    Discarded,
    /// Assembly or serialization failed; nothing was sent.
    Failed,
    /// Another cycle was still in flight.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub ticks_skipped: u64,
}

struct SchedulerState {
    registry: ClientRegistry,
    timer: Option<JoinHandle<()>>,
}

struct Shared<S> {
    source: S,
    interval: Duration,
    state: Mutex<SchedulerState>,
    cycle_in_flight: AtomicBool,
    cycles_run: AtomicU64,
    ticks_skipped: AtomicU64,
}

/// Cheap to clone; clones drive the same registry and timer.
pub struct BroadcastScheduler<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for BroadcastScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Holds the in-flight flag for the lifetime of one cycle.
struct CycleGuard<S> {
    shared: Arc<Shared<S>>,
}

impl<S: SnapshotSource> CycleGuard<S> {
    async fn run(self) -> CycleOutcome {
        self.shared.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.shared.broadcast_once().await
    }
}

impl<S> Drop for CycleGuard<S> {
    fn drop(&mut self) {
        self.shared.cycle_in_flight.store(false, Ordering::Release);
    }
}

impl<S: SnapshotSource> BroadcastScheduler<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                interval,
                state: Mutex::new(SchedulerState {
                    registry: ClientRegistry::new(),
                    timer: None,
                }),
                cycle_in_flight: AtomicBool::new(false),
                cycles_run: AtomicU64::new(0),
                ticks_skipped: AtomicU64::new(0),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Add a client and push it a snapshot right away, without waiting for
    /// the next tick. Starts the timer on the first client.
    pub async fn register(&self, handle: ClientHandle) {
        let id = handle.id();
        let clients = {
            let mut state = self.shared.state.lock().await;
            if state.registry.add(handle.clone()) {
                state.timer = Some(Shared::spawn_timer(&self.shared));
                crate::log_broadcast_operation!("scheduler_started", 1usize);
            }
            state.registry.len()
        };
        tracing::info!(client = %id, clients, "Display client connected");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.push_initial(handle).await });
    }

    /// Remove a client; stops the timer when it was the last one.
    /// Returns `false` if the client was not registered.
    pub async fn unregister(&self, id: ClientId) -> bool {
        self.shared.remove_client(id).await
    }

    pub async fn phase(&self) -> SchedulerPhase {
        let state = self.shared.state.lock().await;
        if state.timer.is_some() {
            SchedulerPhase::Active
        } else {
            SchedulerPhase::Idle
        }
    }

    pub async fn client_count(&self) -> usize {
        self.shared.state.lock().await.registry.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles_run: self.shared.cycles_run.load(Ordering::Relaxed),
            ticks_skipped: self.shared.ticks_skipped.load(Ordering::Relaxed),
        }
    }

    /// Run one cycle now, or report `Skipped` if one is already in flight.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match Shared::try_begin_cycle(&self.shared) {
            Some(guard) => guard.run().await,
            None => CycleOutcome::Skipped,
        }
    }
}

impl<S: SnapshotSource> Shared<S> {
    fn try_begin_cycle(shared: &Arc<Self>) -> Option<CycleGuard<S>> {
        shared
            .cycle_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                shared: Arc::clone(shared),
            })
    }

    fn spawn_timer(shared: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(shared);
        let period = shared.interval;

        tokio::spawn(async move {
            // The new client already got an immediate push; first tick is one period out.
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                match Shared::try_begin_cycle(&shared) {
                    Some(guard) => {
                        // Runs outside the timer task so stopping the timer
                        // never cancels a fetch midway.
                        tokio::spawn(guard.run());
                    },
                    None => {
                        shared.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("Previous cycle still in flight, skipping tick");
                    },
                }
            }
        })
    }

    async fn remove_client(&self, id: ClientId) -> bool {
        let mut state = self.state.lock().await;
        let Some(connected_at) = state.registry.get(id).map(ClientHandle::connected_at) else {
            return false;
        };
        let emptied = state.registry.remove(id);
        let clients = state.registry.len();
        if emptied {
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            crate::log_broadcast_operation!("scheduler_stopped", 0usize);
        }
        drop(state);

        let connected_secs = (Utc::now() - connected_at).num_seconds();
        tracing::info!(client = %id, clients, connected_secs, "Display client disconnected");
        true
    }

    async fn broadcast_once(&self) -> CycleOutcome {
        let snapshot = match self.source.assemble().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot assembly failed, skipping cycle");
                return CycleOutcome::Failed;
            },
        };

        // Membership is read once, after the only suspension point.
        let members = self.state.lock().await.registry.members();
        if members.is_empty() {
            tracing::debug!("No clients left, discarding snapshot");
            return CycleOutcome::Discarded;
        }

        let Some(frame) = serialize(&snapshot) else {
            return CycleOutcome::Failed;
        };

        let mut evicted = Vec::new();
        for client in &members {
            if let Err(e) = client.send(Arc::clone(&frame)) {
                tracing::warn!(error = %e, "Send failed, evicting client");
                evicted.push(e.client());
            }
        }
        for id in &evicted {
            self.remove_client(*id).await;
        }

        tracing::trace!(
            delivered = members.len() - evicted.len(),
            evicted = evicted.len(),
            "Broadcast cycle complete"
        );
        CycleOutcome::Delivered {
            delivered: members.len() - evicted.len(),
            evicted: evicted.len(),
        }
    }

    async fn push_initial(&self, client: ClientHandle) {
        let snapshot = match self.source.assemble().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(client = %client.id(), error = %e, "Initial snapshot failed");
                return;
            },
        };
        let Some(frame) = serialize(&snapshot) else {
            return;
        };
        if let Err(e) = client.send(frame) {
            tracing::debug!(error = %e, "Client left before initial snapshot");
            self.remove_client(client.id()).await;
        }
    }
}

fn serialize(snapshot: &Snapshot) -> Option<Frame> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Frame::from(json)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize snapshot");
            None
        },
    }
}

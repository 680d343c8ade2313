//! Server-side fan-out of snapshots to connected display clients.

pub mod connection;
pub mod registry;
pub mod scheduler;

pub use connection::handle_display_socket;
pub use registry::{
    ClientHandle, ClientId, ClientRegistry, Frame, SendError, CLIENT_QUEUE_CAPACITY,
};
pub use scheduler::{BroadcastScheduler, CycleOutcome, SchedulerPhase, SchedulerStats};

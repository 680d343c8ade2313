//! Display consumer: connection lifecycle and local application state.

pub mod display;
pub mod manager;
pub mod transport;

pub use display::{DisplayChange, DisplayState, StandbyState};
pub use manager::{ClientConnectionManager, ConnectionState, ReconnectPolicy};
pub use transport::{MessageStream, Transport, WsTransport};

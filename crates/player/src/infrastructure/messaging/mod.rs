//! Outbound command path and connection state observation.
//!
//! - `CommandSender`: queue commands for the open session socket
//! - `ConnectionStateObserver`: read the connection lifecycle state (for UI binding)
//!
//! The WebSocket driver (in the websocket module) drains the command queue onto
//! the transport.

pub mod command_bus;
pub mod connection;

pub use command_bus::{CommandError, CommandSender, CommandSink};
#[cfg(any(test, feature = "testing"))]
pub use command_bus::MockCommandSink;
pub use connection::{ConnectionState, ConnectionStateObserver};

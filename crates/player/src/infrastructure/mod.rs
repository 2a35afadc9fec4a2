pub mod messaging;
pub mod storage;
pub mod websocket;

// Re-export messaging types
pub use messaging::{CommandError, CommandSender, CommandSink, ConnectionState};

//! WordGrid Player - client side of a multiplayer word-grid session.
//!
//! This crate contains the session sync client and the board gesture logic:
//! - `geometry` / `gesture` - pointer positions to board cells to traced paths
//! - `infrastructure` - the session WebSocket, outbound commands, saved identity
//! - `state` - the session reducer that every inbound message flows through
//!
//! Rendering is left to the embedding application; `main.rs` drives the client
//! from stdin.

pub mod config;
pub mod console;
pub mod geometry;
pub mod gesture;
pub mod identity;
pub mod infrastructure;
pub mod state;

//! Desktop WebSocket implementation using tokio-tungstenite

mod client;
mod socket;

pub use client::{ClientEvent, SessionClient};

//! Connection lifecycle state shared between the driver and its readers.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of the session connection.
///
/// `Idle → Connecting → Open → Closing → Closed`; `Closed → Connecting` only
/// through a scheduled retry; `Idle` is reachable from anywhere by tearing the
/// connection down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection wanted
    #[default]
    Idle,
    /// Socket handshake in flight
    Connecting,
    /// Socket open, commands may be sent
    Open,
    /// Previous socket is being released
    Closing,
    /// Socket gone (normal close, rejection, waiting for retry, or retries exhausted)
    Closed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
            ConnectionState::Closing => 3,
            ConnectionState::Closed => 4,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            4 => ConnectionState::Closed,
            _ => ConnectionState::Idle,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Observable connection state.
///
/// Multiple observers can share the same underlying state; only the driver
/// writes it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if the socket is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }
}

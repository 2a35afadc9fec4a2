//! WebSocket connection to the session server
//!
//! - `core`: close-code classification and backoff math
//! - `manager`: runtime-free connection state machine
//! - `desktop`: tokio-tungstenite driver that executes the manager's actions

mod core;
mod desktop;
mod manager;

pub use self::core::{
    classify_close, AttemptId, BackoffState, CloseClass, RetryPolicy, ABNORMAL_CLOSURE,
    NORMAL_CLOSURE, POLICY_VIOLATION,
};
pub use manager::{ConnectionAction, ConnectionManager, ConnectionNotice, Step};

pub use desktop::{ClientEvent, SessionClient};

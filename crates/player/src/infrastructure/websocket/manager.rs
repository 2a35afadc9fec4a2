//! Connection lifecycle state machine.
//!
//! `ConnectionManager` owns the rules (when to open, when to retry, which
//! events still count) and performs no I/O. Every handler returns a [`Step`]
//! listing the actions the driver must execute and the notices it should
//! surface.
//!
//! Every socket event carries the [`AttemptId`] it was started with. Tearing a
//! connection down bumps the current id, so anything still in flight from the
//! old socket is dropped at the top of its handler.

use std::time::Duration;

use url::Url;
use wordgrid_shared::ServerMessage;

use super::core::{
    classify_close, AttemptId, BackoffState, CloseClass, RetryPolicy, NORMAL_CLOSURE,
};
use crate::identity::ConnectParams;
use crate::infrastructure::messaging::{ConnectionState, ConnectionStateObserver};

/// Side effects the driver must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    Open { attempt: AttemptId, url: Url },
    Close { attempt: AttemptId, code: u16 },
    ScheduleRetry { attempt: AttemptId, delay: Duration },
    CancelRetry,
}

/// Lifecycle changes worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    Opened,
    /// Connection dropped; retrying after `delay`.
    Reconnecting { failures: u32, delay: Duration },
    /// The server refused the session. The intent has been dropped.
    Rejected { code: u16, reason: String },
    /// Retry budget spent. Surfaced once per run of failures.
    RetriesExhausted { failures: u32 },
    /// The server closed the session normally.
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub actions: Vec<ConnectionAction>,
    pub notices: Vec<ConnectionNotice>,
}

impl Step {
    fn act(&mut self, action: ConnectionAction) {
        self.actions.push(action);
    }

    fn notify(&mut self, notice: ConnectionNotice) {
        self.notices.push(notice);
    }
}

pub struct ConnectionManager {
    server: Url,
    policy: RetryPolicy,
    current: AttemptId,
    state: ConnectionStateObserver,
    /// Socket opened for `current` and not yet reported closed.
    live: Option<AttemptId>,
    /// Superseded socket still shutting down.
    releasing: Option<AttemptId>,
    retry_pending: bool,
    backoff: BackoffState,
    target: Option<ConnectParams>,
}

impl ConnectionManager {
    pub fn new(server: Url, policy: RetryPolicy, state: ConnectionStateObserver) -> Self {
        state.set(ConnectionState::Idle);
        Self {
            server,
            policy,
            current: AttemptId::default(),
            state,
            live: None,
            releasing: None,
            retry_pending: false,
            backoff: BackoffState::default(),
            target: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    pub fn current_attempt(&self) -> AttemptId {
        self.current
    }

    /// Socket that outbound frames should go to.
    pub fn live_attempt(&self) -> Option<AttemptId> {
        self.live.filter(|_| self.state() == ConnectionState::Open)
    }

    pub fn target(&self) -> Option<&ConnectParams> {
        self.target.as_ref()
    }

    pub fn failures(&self) -> u32 {
        self.backoff.failures()
    }

    fn is_current(&self, attempt: AttemptId, event: &'static str) -> bool {
        if attempt == self.current {
            return true;
        }
        tracing::debug!(
            attempt = %attempt,
            current = %self.current,
            event,
            "Ignoring event from superseded socket"
        );
        false
    }

    /// Point the connection at a new identity, or at nothing.
    ///
    /// Re-asserting the current target is a no-op.
    pub fn set_target(&mut self, target: Option<ConnectParams>) -> Step {
        let mut step = Step::default();
        match target {
            Some(params) if self.target.as_ref() == Some(&params) => {
                if self.state() == ConnectionState::Idle {
                    self.open(&mut step);
                }
            }
            Some(params) => {
                if self.target.is_some() || self.live.is_some() {
                    self.teardown(&mut step);
                }
                tracing::info!(code = %params.code, player = %params.player_id, "Connection target set");
                self.target = Some(params);
                self.open(&mut step);
            }
            None => {
                if self.target.take().is_some() {
                    tracing::info!("Connection target cleared");
                }
                self.teardown(&mut step);
            }
        }
        step
    }

    pub fn disconnect(&mut self) -> Step {
        self.set_target(None)
    }

    /// Reconnect right away after a normal close or exhausted retries.
    pub fn retry_now(&mut self) -> Step {
        let mut step = Step::default();
        if self.target.is_none() || self.live.is_some() {
            return step;
        }
        self.cancel_retry(&mut step);
        self.backoff.reset();
        self.open(&mut step);
        step
    }

    pub fn on_open(&mut self, attempt: AttemptId) -> Step {
        let mut step = Step::default();
        if !self.is_current(attempt, "open") || self.live != Some(attempt) {
            return step;
        }
        tracing::info!(attempt = %attempt, "Connected to session");
        self.backoff.reset();
        self.state.set(ConnectionState::Open);
        step.notify(ConnectionNotice::Opened);
        step
    }

    /// Decode one text frame from `attempt`. Frames from superseded sockets and
    /// undecodable frames yield nothing.
    pub fn on_message(&self, attempt: AttemptId, text: &str) -> Option<ServerMessage> {
        if !self.is_current(attempt, "message") || self.state() != ConnectionState::Open {
            return None;
        }
        match ServerMessage::decode(text) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(attempt = %attempt, error = %e, "Dropping undecodable frame");
                None
            }
        }
    }

    pub fn on_close(&mut self, attempt: AttemptId, code: u16, reason: &str) -> Step {
        let mut step = Step::default();
        if !self.is_current(attempt, "close") || self.live != Some(attempt) {
            return step;
        }
        self.live = None;
        self.state.set(ConnectionState::Closed);

        match classify_close(code) {
            CloseClass::Normal => {
                tracing::info!(attempt = %attempt, "Session closed normally");
                self.backoff.reset();
                step.notify(ConnectionNotice::Closed);
            }
            CloseClass::Rejected => {
                tracing::error!(attempt = %attempt, code, reason, "Session rejected");
                self.backoff.reset();
                self.target = None;
                step.notify(ConnectionNotice::Rejected {
                    code,
                    reason: reason.to_string(),
                });
            }
            CloseClass::Retryable => match self.backoff.record_failure(&self.policy) {
                Some(delay) => {
                    let failures = self.backoff.failures();
                    tracing::warn!(
                        attempt = %attempt,
                        code,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "Connection lost, scheduling reconnect"
                    );
                    self.retry_pending = true;
                    step.act(ConnectionAction::ScheduleRetry {
                        attempt: self.current,
                        delay,
                    });
                    step.notify(ConnectionNotice::Reconnecting { failures, delay });
                }
                None => {
                    let failures = self.backoff.failures();
                    tracing::error!(attempt = %attempt, code, failures, "Giving up on reconnecting");
                    step.notify(ConnectionNotice::RetriesExhausted { failures });
                }
            },
        }
        step
    }

    pub fn on_retry_timer(&mut self, attempt: AttemptId) -> Step {
        let mut step = Step::default();
        if !self.is_current(attempt, "retry") || !self.retry_pending {
            return step;
        }
        self.retry_pending = false;
        if self.target.is_some() && self.live.is_none() {
            self.open(&mut step);
        }
        step
    }

    /// A socket task has fully shut down.
    pub fn on_released(&mut self, attempt: AttemptId) -> Step {
        let mut step = Step::default();
        if self.releasing != Some(attempt) {
            return step;
        }
        tracing::debug!(attempt = %attempt, "Previous socket released");
        self.releasing = None;
        if self.target.is_some() {
            self.open(&mut step);
        } else {
            self.state.set(ConnectionState::Idle);
        }
        step
    }

    fn cancel_retry(&mut self, step: &mut Step) {
        if std::mem::take(&mut self.retry_pending) {
            step.act(ConnectionAction::CancelRetry);
        }
    }

    fn teardown(&mut self, step: &mut Step) {
        self.cancel_retry(step);
        self.backoff.reset();
        if let Some(attempt) = self.live.take() {
            tracing::info!(attempt = %attempt, "Closing connection");
            step.act(ConnectionAction::Close {
                attempt,
                code: NORMAL_CLOSURE,
            });
            self.releasing = Some(attempt);
        }
        self.current = self.current.next();
        let state = if self.releasing.is_some() {
            ConnectionState::Closing
        } else {
            ConnectionState::Idle
        };
        self.state.set(state);
    }

    /// Open a socket for the target unless one is still being released.
    fn open(&mut self, step: &mut Step) {
        let Some(target) = self.target.as_ref() else {
            return;
        };
        if self.releasing.is_some() {
            tracing::debug!("Deferring open until previous socket is released");
            return;
        }
        self.current = self.current.next();
        let url = target.url(&self.server);
        tracing::info!(attempt = %self.current, url = %url, "Opening connection");
        self.live = Some(self.current);
        self.state.set(ConnectionState::Connecting);
        step.act(ConnectionAction::Open {
            attempt: self.current,
            url,
        });
    }
}

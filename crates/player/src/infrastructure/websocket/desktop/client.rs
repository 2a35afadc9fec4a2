//! Desktop session client using tokio-tungstenite.
//!
//! A single driver task owns the [`ConnectionManager`] and the [`SessionStore`]
//! and handles one event at a time: control requests from the handle, outbound
//! commands, tagged socket events and timer wake-ups. Socket tasks never touch
//! shared state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;
use wordgrid_shared::ClientMessage;

use super::socket::{run_socket, SocketCommand, SocketEvent, TaggedEvent};
use crate::identity::ConnectParams;
use crate::infrastructure::messaging::{CommandSender, ConnectionStateObserver};
use crate::infrastructure::websocket::core::{AttemptId, RetryPolicy};
use crate::infrastructure::websocket::manager::{
    ConnectionAction, ConnectionManager, ConnectionNotice, Step,
};
use crate::state::{ApplyOutcome, SessionState, SessionStore, TransientTimings};

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;
const SOCKET_QUEUE: usize = 32;

/// Something the surrounding application should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connection(ConnectionNotice),
    /// The server reported a fatal session error; the connection was dropped.
    SessionEnded { reason: String },
}

#[derive(Debug)]
enum Control {
    Connect {
        params: ConnectParams,
        settle: Duration,
    },
    Disconnect,
    RetryNow,
    Shutdown,
}

/// Handle to a running session driver.
pub struct SessionClient {
    control: mpsc::UnboundedSender<Control>,
    commands: CommandSender,
    state: watch::Receiver<SessionState>,
    connection: ConnectionStateObserver,
    task: JoinHandle<()>,
}

impl SessionClient {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(
        server: Url,
        policy: RetryPolicy,
        timings: TransientTimings,
    ) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let connection = ConnectionStateObserver::default();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (socket_tx, socket_rx) = mpsc::channel(EVENT_QUEUE);
        let (state_tx, state_rx) = watch::channel(SessionState::default());

        let driver = Driver {
            manager: ConnectionManager::new(server, policy, connection.clone()),
            store: SessionStore::new(timings),
            sockets: HashMap::new(),
            socket_tx,
            retry_at: None,
            settle: None,
            state_tx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(control_rx, command_rx, socket_rx));

        let client = Self {
            control: control_tx,
            commands: CommandSender::new(command_tx, connection.clone()),
            state: state_rx,
            connection,
            task,
        };
        (client, event_rx)
    }

    /// Join `params` right away, replacing any current session.
    pub fn connect(&self, params: ConnectParams) {
        self.send_control(Control::Connect {
            params,
            settle: Duration::ZERO,
        });
    }

    /// Rejoin a restored session after `settle`, giving a previous connection
    /// with the same identity time to be dropped server-side.
    pub fn resume(&self, params: ConnectParams, settle: Duration) {
        self.send_control(Control::Connect { params, settle });
    }

    pub fn disconnect(&self) {
        self.send_control(Control::Disconnect);
    }

    /// Reconnect now after a normal close or exhausted retries.
    pub fn retry_now(&self) {
        self.send_control(Control::RetryNow);
    }

    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn connection(&self) -> ConnectionStateObserver {
        self.connection.clone()
    }

    /// Close the connection and wait for the driver to stop.
    pub async fn shutdown(self) {
        self.send_control(Control::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!("Session driver panicked: {}", e);
        }
    }

    fn send_control(&self, control: Control) {
        if self.control.send(control).is_err() {
            tracing::warn!("Session driver is no longer running");
        }
    }
}

struct Driver {
    manager: ConnectionManager,
    store: SessionStore,
    sockets: HashMap<AttemptId, mpsc::Sender<SocketCommand>>,
    socket_tx: mpsc::Sender<TaggedEvent>,
    retry_at: Option<(AttemptId, Instant)>,
    settle: Option<(ConnectParams, Instant)>,
    state_tx: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl Driver {
    async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut commands: mpsc::Receiver<ClientMessage>,
        mut socket_events: mpsc::Receiver<TaggedEvent>,
    ) {
        loop {
            let wake = self.next_wake();
            tokio::select! {
                request = control.recv() => match request {
                    Some(Control::Shutdown) | None => break,
                    Some(request) => self.on_control(request),
                },
                Some(command) = commands.recv() => self.forward(command),
                Some((attempt, event)) = socket_events.recv() => self.on_socket_event(attempt, event),
                _ = sleep_until(wake) => self.on_wake(now()),
            }
        }

        let step = self.manager.disconnect();
        self.execute(step);
        tracing::info!("Session driver stopped");
    }

    fn on_control(&mut self, request: Control) {
        match request {
            Control::Connect { params, settle } => {
                if self.manager.target() != Some(&params) {
                    self.store.reset();
                }
                self.store.set_local_player(Some(params.player_id.clone()));
                self.publish();
                if settle.is_zero() {
                    self.settle = None;
                    let step = self.manager.set_target(Some(params));
                    self.execute(step);
                } else {
                    if self.manager.target() != Some(&params) {
                        let step = self.manager.set_target(None);
                        self.execute(step);
                    }
                    tracing::debug!(delay_ms = settle.as_millis() as u64, "Waiting before rejoining");
                    self.settle = Some((params, now() + settle));
                }
            }
            Control::Disconnect => {
                self.settle = None;
                let step = self.manager.disconnect();
                self.execute(step);
                self.store.reset();
                self.publish();
            }
            Control::RetryNow => {
                let step = self.manager.retry_now();
                self.execute(step);
            }
            Control::Shutdown => {}
        }
    }

    fn forward(&self, command: ClientMessage) {
        let Some(socket) = self
            .manager
            .live_attempt()
            .and_then(|attempt| self.sockets.get(&attempt))
        else {
            tracing::debug!(kind = command.kind(), "Dropping command: no open socket");
            return;
        };
        let text = match command.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(kind = command.kind(), error = %e, "Failed to encode command");
                return;
            }
        };
        if socket.try_send(SocketCommand::Send(text)).is_err() {
            tracing::warn!(kind = command.kind(), "Socket queue unavailable, dropping command");
        }
    }

    fn on_socket_event(&mut self, attempt: AttemptId, event: SocketEvent) {
        let now = now();
        match event {
            SocketEvent::Opened => {
                let step = self.manager.on_open(attempt);
                self.execute(step);
            }
            SocketEvent::Text(text) => {
                let Some(message) = self.manager.on_message(attempt, &text) else {
                    return;
                };
                let kind = message.kind().to_string();
                match self.store.apply(message, now) {
                    ApplyOutcome::Applied => self.publish(),
                    ApplyOutcome::Ignored => {
                        tracing::debug!(kind = %kind, "Message had no effect");
                    }
                    ApplyOutcome::Teardown { reason } => {
                        self.publish();
                        let step = self.manager.disconnect();
                        self.execute(step);
                        self.emit(ClientEvent::SessionEnded { reason });
                    }
                }
            }
            SocketEvent::Closed { code, reason } => {
                let step = self.manager.on_close(attempt, code, &reason);
                self.execute(step);
            }
            SocketEvent::Released => {
                self.sockets.remove(&attempt);
                let step = self.manager.on_released(attempt);
                self.execute(step);
            }
        }
    }

    fn on_wake(&mut self, now: Instant) {
        if let Some((attempt, _)) = self.retry_at.filter(|(_, at)| *at <= now) {
            self.retry_at = None;
            let step = self.manager.on_retry_timer(attempt);
            self.execute(step);
        }
        if self.settle.as_ref().is_some_and(|(_, at)| *at <= now) {
            if let Some((params, _)) = self.settle.take() {
                let step = self.manager.set_target(Some(params));
                self.execute(step);
            }
        }
        if self.store.expire(now) {
            self.publish();
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        [
            self.retry_at.map(|(_, at)| at),
            self.settle.as_ref().map(|(_, at)| *at),
            self.store.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn execute(&mut self, step: Step) {
        for action in step.actions {
            match action {
                ConnectionAction::Open { attempt, url } => {
                    let (tx, rx) = mpsc::channel(SOCKET_QUEUE);
                    self.sockets.insert(attempt, tx);
                    tokio::spawn(run_socket(attempt, url, rx, self.socket_tx.clone()));
                }
                ConnectionAction::Close { attempt, code } => {
                    // Dropping the sender also ends the task if the queue is full.
                    if let Some(socket) = self.sockets.remove(&attempt) {
                        let _ = socket.try_send(SocketCommand::Close(code));
                    }
                }
                ConnectionAction::ScheduleRetry { attempt, delay } => {
                    self.retry_at = Some((attempt, now() + delay));
                }
                ConnectionAction::CancelRetry => self.retry_at = None,
            }
        }
        for notice in step.notices {
            if let ConnectionNotice::Rejected { reason, .. } = &notice {
                self.store.end(reason.as_str());
                self.publish();
            }
            self.emit(ClientEvent::Connection(notice));
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.store.state().clone());
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No listener for client events");
        }
    }
}

/// Wall clock as tokio sees it, so deadlines follow a paused test clock.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

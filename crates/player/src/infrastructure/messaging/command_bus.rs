//! Outbound commands for the session.
//!
//! `CommandSender` is a cheap, cloneable handle that queues `ClientMessage`s for
//! the driver. It refuses commands while the socket is not open instead of
//! buffering them across reconnects: a new connection always starts from a
//! fresh snapshot, so stale intents are not replayed.

use tokio::sync::mpsc;
use wordgrid_shared::{Cell, ClientMessage, PowerupKind};

use super::connection::ConnectionStateObserver;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("not connected to the session")]
    NotConnected,
    #[error("command queue is full")]
    QueueFull,
    #[error("session client has shut down")]
    ChannelClosed,
}

/// Anything that accepts outbound commands.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CommandSink: Send + Sync {
    fn send(&self, command: ClientMessage) -> Result<(), CommandError>;
}

/// Command sender bound to one session client.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<ClientMessage>,
    state: ConnectionStateObserver,
}

impl CommandSender {
    pub fn new(tx: mpsc::Sender<ClientMessage>, state: ConnectionStateObserver) -> Self {
        Self { tx, state }
    }

    pub fn submit_word(&self, word: impl Into<String>, path: Vec<Cell>) -> Result<(), CommandError> {
        self.send(ClientMessage::SubmitWord {
            word: word.into(),
            path,
        })
    }

    pub fn use_powerup(&self, powerup: PowerupKind) -> Result<(), CommandError> {
        self.send(ClientMessage::UsePowerup { powerup })
    }

    pub fn toggle_ready(&self) -> Result<(), CommandError> {
        self.send(ClientMessage::ToggleReady {})
    }

    /// Host-only by convention; the server enforces it.
    pub fn set_board_size(&self, size: u8) -> Result<(), CommandError> {
        self.send(ClientMessage::SetBoardSize { size })
    }

    pub fn reset_game(&self) -> Result<(), CommandError> {
        self.send(ClientMessage::ResetGame {})
    }

    pub fn play_again(&self) -> Result<(), CommandError> {
        self.send(ClientMessage::PlayAgain {})
    }
}

impl CommandSink for CommandSender {
    fn send(&self, command: ClientMessage) -> Result<(), CommandError> {
        if !self.state.is_open() {
            tracing::debug!(kind = command.kind(), "Command refused: socket not open");
            return Err(CommandError::NotConnected);
        }
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CommandError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => CommandError::ChannelClosed,
        })
    }
}

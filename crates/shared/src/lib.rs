//! WordGrid Shared - wire types for player client / session server communication
//!
//! This crate contains the types both ends of the session WebSocket agree on:
//! - Message envelopes (`ClientMessage`, `ServerMessage`)
//! - Normalized inbound payload schemas
//! - Board vocabulary (`Cell`, `Board`, `BoardSize`) and identifiers
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, uuid, thiserror and tracing
//! 2. **No game logic** - Pure data types, serialization and payload normalization
//! 3. **Tolerant decoding** - Inbound payloads never fail on a single bad field

pub mod lenient;
pub mod messages;
pub mod payloads;
pub mod types;

pub use messages::{ClientMessage, ProtocolError, ServerMessage};
pub use payloads::{
    BoardUpdatePayload, BonusTimerEntry, BonusTimerPayload, ErrorPayload, FinalResultPayload,
    GameEndPayload, GameStateSnapshot, LobbyUpdate, PlayAgainPayload, PlayerPayload,
    PlayerTimeUpPayload, PowerupConsumedPayload, PowerupEventPayload, ScoreUpdatePayload,
    TimerUpdate, WaitingPhasePayload, WordAwardPayload, WordResultPayload,
};
pub use types::{
    Board, BoardSize, Cell, GamePhase, JoinMode, PlayerId, PowerupKind, SessionCode,
    SessionCodeError, MAX_BOARD_SIZE, MIN_BOARD_SIZE,
};

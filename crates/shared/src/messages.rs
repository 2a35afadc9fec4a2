//! WebSocket message types for client-session communication
//!
//! Every message in both directions is one JSON object of the form
//! `{ "type": string, "data": object }`, one message per frame.
//!
//! ## Versioning Policy
//!
//! - New inbound kinds can be added at any time (forward compatible)
//! - Unknown inbound kinds decode to `ServerMessage::Unknown` and are ignored
//! - Renaming a `type` string is a breaking change

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient::{self, Normalize};
use crate::payloads::{
    BoardUpdatePayload, BonusTimerPayload, ErrorPayload, GameEndPayload, GameStateSnapshot,
    LobbyUpdate, PlayAgainPayload, PlayerTimeUpPayload, PowerupConsumedPayload,
    PowerupEventPayload, ScoreUpdatePayload, TimerUpdate, WaitingPhasePayload, WordResultPayload,
};
use crate::types::{Cell, PowerupKind};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// =============================================================================
// Client Messages (Player → Session)
// =============================================================================

/// Commands sent by the local player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a traced word; `path` lists the cells in trace order.
    SubmitWord { word: String, path: Vec<Cell> },
    /// Activate a held powerup.
    UsePowerup { powerup: PowerupKind },
    /// Flip the local ready flag in the lobby.
    ToggleReady {},
    /// Change the board size (host only, enforced server-side).
    SetBoardSize { size: u8 },
    /// Return the session to the lobby.
    ResetGame {},
    /// Vote for another round from the end screen.
    PlayAgain {},
}

impl ClientMessage {
    /// Wire `type` string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SubmitWord { .. } => "submit_word",
            ClientMessage::UsePowerup { .. } => "use_powerup",
            ClientMessage::ToggleReady {} => "toggle_ready",
            ClientMessage::SetBoardSize { .. } => "set_board_size",
            ClientMessage::ResetGame {} => "reset_game",
            ClientMessage::PlayAgain {} => "play_again",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// =============================================================================
// Server Messages (Session → Player)
// =============================================================================

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Messages pushed by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    LobbyUpdate(LobbyUpdate),
    GameState(GameStateSnapshot),
    TimerUpdate(TimerUpdate),
    WordResult(WordResultPayload),
    GameEnd(GameEndPayload),
    PowerupEvent(PowerupEventPayload),
    PowerupConsumed(PowerupConsumedPayload),
    BoardUpdate(BoardUpdatePayload),
    ScoreUpdate(ScoreUpdatePayload),
    WaitingPhase(WaitingPhasePayload),
    PlayerTimeUp(PlayerTimeUpPayload),
    BonusTimerUpdate(BonusTimerPayload),
    PlayAgainUpdate(PlayAgainPayload),
    Error(ErrorPayload),
    /// Kind not known to this client version.
    Unknown { kind: String },
}

impl ServerMessage {
    /// Decode one text frame.
    ///
    /// A missing or `null` `data` decodes as an empty payload. Only a broken
    /// envelope or a non-object `data` for a known kind is an error.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let Envelope { kind, data } =
            serde_json::from_str(text).map_err(ProtocolError::Envelope)?;
        let data = if data.is_null() {
            Value::Object(Default::default())
        } else {
            data
        };

        fn payload<T: Normalize>(kind: &str, data: Value) -> Result<T, ProtocolError> {
            lenient::decode(data).map_err(|source| ProtocolError::Payload {
                kind: kind.to_string(),
                source,
            })
        }

        Ok(match kind.as_str() {
            "lobby_update" => Self::LobbyUpdate(payload(&kind, data)?),
            "game_state" => Self::GameState(payload(&kind, data)?),
            "timer_update" => Self::TimerUpdate(payload(&kind, data)?),
            "word_result" => Self::WordResult(payload(&kind, data)?),
            "game_end" => Self::GameEnd(payload(&kind, data)?),
            "powerup_event" => Self::PowerupEvent(payload(&kind, data)?),
            "powerup_consumed" => Self::PowerupConsumed(payload(&kind, data)?),
            "board_update" => Self::BoardUpdate(payload(&kind, data)?),
            "score_update" => Self::ScoreUpdate(payload(&kind, data)?),
            "waiting_phase" => Self::WaitingPhase(payload(&kind, data)?),
            "player_time_up" => Self::PlayerTimeUp(payload(&kind, data)?),
            "bonus_timer_update" => Self::BonusTimerUpdate(payload(&kind, data)?),
            "play_again_update" => Self::PlayAgainUpdate(payload(&kind, data)?),
            "error" => Self::Error(payload(&kind, data)?),
            _ => Self::Unknown { kind },
        })
    }

    /// Wire `type` string for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::LobbyUpdate(_) => "lobby_update",
            Self::GameState(_) => "game_state",
            Self::TimerUpdate(_) => "timer_update",
            Self::WordResult(_) => "word_result",
            Self::GameEnd(_) => "game_end",
            Self::PowerupEvent(_) => "powerup_event",
            Self::PowerupConsumed(_) => "powerup_consumed",
            Self::BoardUpdate(_) => "board_update",
            Self::ScoreUpdate(_) => "score_update",
            Self::WaitingPhase(_) => "waiting_phase",
            Self::PlayerTimeUp(_) => "player_time_up",
            Self::BonusTimerUpdate(_) => "bonus_timer_update",
            Self::PlayAgainUpdate(_) => "play_again_update",
            Self::Error(_) => "error",
            Self::Unknown { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerId;
    use serde_json::json;

    #[test]
    fn test_submit_word_envelope() {
        let msg = ClientMessage::SubmitWord {
            word: "CAT".into(),
            path: vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(1, 1)],
        };
        let value: Value = serde_json::from_str(&msg.encode().expect("encode")).expect("json");
        assert_eq!(
            value,
            json!({"type": "submit_word", "data": {"word": "CAT", "path": [[0, 0], [0, 1], [1, 1]]}})
        );
    }

    #[test]
    fn test_unit_commands_carry_empty_data() {
        let value: Value =
            serde_json::from_str(&ClientMessage::ToggleReady {}.encode().expect("encode"))
                .expect("json");
        assert_eq!(value, json!({"type": "toggle_ready", "data": {}}));

        let value: Value = serde_json::from_str(
            &ClientMessage::UsePowerup {
                powerup: PowerupKind::BlowUp,
            }
            .encode()
            .expect("encode"),
        )
        .expect("json");
        assert_eq!(
            value,
            json!({"type": "use_powerup", "data": {"powerup": "blow_up"}})
        );
    }

    #[test]
    fn test_unknown_kind_is_forward_compatible() {
        let msg = ServerMessage::decode(r#"{"type": "emote", "data": {"x": 1}}"#).expect("decode");
        assert_eq!(
            msg,
            ServerMessage::Unknown {
                kind: "emote".into()
            }
        );
    }

    #[test]
    fn test_missing_data_decodes_as_empty_payload() {
        let msg = ServerMessage::decode(r#"{"type": "timer_update"}"#).expect("decode");
        assert_eq!(msg, ServerMessage::TimerUpdate(TimerUpdate { timer: None }));
    }

    #[test]
    fn test_partial_payload_keeps_good_fields() {
        let msg = ServerMessage::decode(
            r#"{"type": "score_update", "data": {"player_id": "p1", "score": "oops", "earned_powerup": "lock"}}"#,
        )
        .expect("decode");
        let ServerMessage::ScoreUpdate(update) = msg else {
            panic!("expected score_update");
        };
        assert_eq!(update.player_id, Some(PlayerId::new("p1")));
        assert_eq!(update.score, None);
        assert_eq!(update.powerup, Some(PowerupKind::Lock));
    }

    #[test]
    fn test_error_with_both_reason_keys_still_decodes() {
        let msg = ServerMessage::decode(
            r#"{"type": "error", "data": {"message": "Session closed", "error": "SESSION_CLOSED"}}"#,
        )
        .expect("decode");
        let ServerMessage::Error(payload) = msg else {
            panic!("expected error");
        };
        assert_eq!(payload.reason(), "Session closed");
    }

    #[test]
    fn test_word_result_with_both_point_keys_keeps_canonical() {
        let msg = ServerMessage::decode(
            r#"{"type": "word_result", "data": {"word": "CAT", "points": 3, "score": 120, "is_valid": true, "valid": null}}"#,
        )
        .expect("decode");
        let ServerMessage::WordResult(result) = msg else {
            panic!("expected word_result");
        };
        assert_eq!(result.points, Some(3));
        assert_eq!(result.valid, Some(true));
        assert_eq!(result.word.as_deref(), Some("CAT"));
    }

    #[test]
    fn test_broken_envelope_is_an_error() {
        assert!(matches!(
            ServerMessage::decode("not json"),
            Err(ProtocolError::Envelope(_))
        ));
        assert!(matches!(
            ServerMessage::decode(r#"{"type": "game_state", "data": [1, 2]}"#),
            Err(ProtocolError::Payload { .. })
        ));
    }
}

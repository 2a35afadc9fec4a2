//! Inbound payload schemas.
//!
//! Every field is optional and decoded leniently (see [`crate::lenient`]), so a
//! message with missing or malformed fields still applies whatever it does
//! carry. Historical key spellings are listed per payload in its
//! [`Normalize`] table and folded onto the canonical key before decoding; the
//! session store only ever sees these normalized shapes.

use serde::Deserialize;

use crate::lenient::{self, Aliases, Normalize};
use crate::types::{Board, Cell, GamePhase, PlayerId, PowerupKind};

// =============================================================================
// Players
// =============================================================================

/// One roster entry as carried by snapshots.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub ready: Option<bool>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub score: Option<u32>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub powerups: Option<Vec<PowerupKind>>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub bonus_time: Option<u32>,
}

impl Normalize for PlayerPayload {
    const ALIASES: Aliases = &[
        ("id", &["player_id"]),
        ("name", &["display_name", "username"]),
        ("avatar", &["avatar_id", "emoji"]),
        ("ready", &["is_ready"]),
        ("powerups", &["inventory"]),
        ("bonus_time", &["bonus_time_remaining", "bonus_seconds"]),
    ];
}

// =============================================================================
// Snapshots
// =============================================================================

/// `lobby_update`: full session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LobbyUpdate {
    #[serde(default, deserialize_with = "lenient::roster")]
    pub players: Option<Vec<PlayerPayload>>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub host: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub board_size: Option<u8>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub phase: Option<GamePhase>,
}

impl Normalize for LobbyUpdate {
    const ALIASES: Aliases = &[
        ("host", &["host_id"]),
        ("board_size", &["size"]),
        ("phase", &["state", "status"]),
    ];
}

/// `game_state`: full in-round snapshot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameStateSnapshot {
    #[serde(default, deserialize_with = "lenient::option")]
    pub board: Option<Board>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub timer: Option<u32>,
    #[serde(default, deserialize_with = "lenient::roster")]
    pub players: Option<Vec<PlayerPayload>>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub phase: Option<GamePhase>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub board_size: Option<u8>,
}

impl Normalize for GameStateSnapshot {
    const ALIASES: Aliases = &[
        ("board", &["grid"]),
        ("timer", &["time_left", "time_remaining"]),
        ("phase", &["state", "status"]),
        ("board_size", &["size"]),
    ];
}

/// `timer_update`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimerUpdate {
    #[serde(default, deserialize_with = "lenient::count")]
    pub timer: Option<u32>,
}

impl Normalize for TimerUpdate {
    const ALIASES: Aliases = &[("timer", &["time_left", "time_remaining", "seconds"])];
}

// =============================================================================
// Round events
// =============================================================================

/// `word_result`: outcome of one submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WordResultPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub word: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub valid: Option<bool>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub points: Option<u32>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub path: Option<Vec<Cell>>,
}

impl Normalize for WordResultPayload {
    const ALIASES: Aliases = &[
        ("valid", &["is_valid", "success"]),
        ("points", &["score"]),
        ("message", &["reason"]),
    ];
}

/// One row of the final standings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FinalResultPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub score: Option<u32>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub words: Option<Vec<String>>,
}

impl Normalize for FinalResultPayload {
    const ALIASES: Aliases = &[
        ("player_id", &["id"]),
        ("name", &["display_name"]),
        ("words", &["found_words"]),
    ];
}

/// One per-word award in the end-of-game reveal.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WordAwardPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub word: Option<String>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub points: Option<u32>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub award: Option<String>,
}

impl Normalize for WordAwardPayload {
    const ALIASES: Aliases = &[
        ("points", &["score"]),
        ("award", &["title", "label"]),
    ];
}

/// `game_end`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameEndPayload {
    #[serde(default, deserialize_with = "lenient::roster")]
    pub results: Option<Vec<FinalResultPayload>>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub winner: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::normalized_list")]
    pub awards: Option<Vec<WordAwardPayload>>,
}

impl Normalize for GameEndPayload {
    const ALIASES: Aliases = &[
        ("results", &["final_scores", "final_results"]),
        ("winner", &["winner_id"]),
        ("awards", &["word_awards"]),
    ];
}

/// `powerup_event`: someone activated a powerup.
///
/// The activating player is `activating_player`; the legacy `by` key is only
/// consulted when `activating_player` is absent. See [`Self::activator`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PowerupEventPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub powerup: Option<PowerupKind>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub activating_player: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub by: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub cells: Option<Vec<Cell>>,
    /// Effect duration in seconds; client defaults apply when absent.
    #[serde(default, deserialize_with = "lenient::count")]
    pub duration: Option<u32>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub bonus_seconds: Option<u32>,
}

impl Normalize for PowerupEventPayload {
    const ALIASES: Aliases = &[
        ("powerup", &["kind"]),
        ("activating_player", &["activator"]),
        ("cells", &["blocked_cells", "targets"]),
        ("bonus_seconds", &["bonus_time"]),
    ];
}

impl PowerupEventPayload {
    pub fn activator(&self) -> Option<&PlayerId> {
        self.activating_player.as_ref().or(self.by.as_ref())
    }
}

/// `powerup_consumed`: inventory delta for one player.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PowerupConsumedPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub powerup: Option<PowerupKind>,
    /// Full replacement inventory, when the server sends one.
    #[serde(default, deserialize_with = "lenient::list")]
    pub powerups: Option<Vec<PowerupKind>>,
}

impl Normalize for PowerupConsumedPayload {
    const ALIASES: Aliases = &[
        ("player_id", &["by"]),
        ("powerup", &["kind"]),
        ("powerups", &["inventory"]),
    ];
}

/// `board_update`: broadcast board replacement (shuffle).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BoardUpdatePayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub board: Option<Board>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub protected_players: Option<Vec<PlayerId>>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub old_board: Option<Board>,
}

impl Normalize for BoardUpdatePayload {
    const ALIASES: Aliases = &[
        ("board", &["new_board"]),
        ("protected_players", &["locked_players"]),
    ];
}

impl BoardUpdatePayload {
    pub fn protects(&self, player: &PlayerId) -> bool {
        self.protected_players
            .as_deref()
            .is_some_and(|ids| ids.contains(player))
    }
}

/// `score_update`: per-player score change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScoreUpdatePayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    /// New absolute score.
    #[serde(default, deserialize_with = "lenient::count")]
    pub score: Option<u32>,
    /// Points to add, when no absolute score is sent.
    #[serde(default, deserialize_with = "lenient::signed")]
    pub delta: Option<i64>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub powerup: Option<PowerupKind>,
}

impl Normalize for ScoreUpdatePayload {
    const ALIASES: Aliases = &[
        ("score", &["total"]),
        ("delta", &["points"]),
        ("powerup", &["earned_powerup", "new_powerup"]),
    ];
}

/// `waiting_phase`: a player (possibly the local one) ran out of time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WaitingPhasePayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub still_playing: Option<Vec<PlayerId>>,
}

impl Normalize for WaitingPhasePayload {
    const ALIASES: Aliases = &[("still_playing", &["remaining_players", "active_players"])];
}

/// `player_time_up`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayerTimeUpPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
}

impl Normalize for PlayerTimeUpPayload {
    const ALIASES: Aliases = &[("player_id", &["id"])];
}

/// One entry of the list form of `bonus_timer_update`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BonusTimerEntry {
    #[serde(default, deserialize_with = "lenient::option")]
    pub player_id: Option<PlayerId>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub bonus_time: Option<u32>,
}

impl Normalize for BonusTimerEntry {
    const ALIASES: Aliases = &[
        ("player_id", &["id"]),
        ("bonus_time", &["bonus_time_remaining", "seconds"]),
    ];
}

/// `bonus_timer_update`: remaining bonus seconds, either as a
/// `{ player_id: seconds }` map or a list of entries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BonusTimerPayload {
    #[serde(default, deserialize_with = "lenient::seconds_by_player")]
    pub timers: Option<Vec<(PlayerId, u32)>>,
    #[serde(default, deserialize_with = "lenient::normalized_list")]
    pub players: Option<Vec<BonusTimerEntry>>,
}

impl Normalize for BonusTimerPayload {
    const ALIASES: Aliases = &[("timers", &["bonus_times"])];
}

impl BonusTimerPayload {
    /// All usable `(player, seconds)` pairs from either form.
    pub fn entries(&self) -> Vec<(PlayerId, u32)> {
        let mut entries = self.timers.clone().unwrap_or_default();
        entries.extend(self.players.iter().flatten().filter_map(|entry| {
            Some((entry.player_id.clone()?, entry.bonus_time?))
        }));
        entries
    }
}

/// `play_again_update`: who has voted for another round.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayAgainPayload {
    #[serde(default, deserialize_with = "lenient::list")]
    pub players: Option<Vec<PlayerId>>,
}

impl Normalize for PlayAgainPayload {
    const ALIASES: Aliases = &[("players", &["ready_players", "votes"])];
}

/// `error`: terminal, session-level failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, deserialize_with = "lenient::option")]
    pub message: Option<String>,
}

impl Normalize for ErrorPayload {
    const ALIASES: Aliases = &[("message", &["reason", "error", "detail"])];
}

impl ErrorPayload {
    pub fn reason(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("The session ended unexpectedly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: Normalize>(json: &str) -> Result<T, serde_json::Error> {
        lenient::decode(serde_json::from_str(json)?)
    }

    #[test]
    fn test_roster_accepts_keyed_object() {
        let update: LobbyUpdate = parse(
            r#"{"players": {"p1": {"name": "Ada", "is_ready": true}}, "host_id": "p1"}"#,
        )
        .expect("decode");
        let players = update.players.expect("players");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, Some(PlayerId::new("p1")));
        assert_eq!(players[0].ready, Some(true));
        assert_eq!(update.host, Some(PlayerId::new("p1")));
    }

    #[test]
    fn test_activator_prefers_explicit_field() {
        let event: PowerupEventPayload = parse(
            r#"{"powerup": "freeze", "activating_player": "a", "by": "b"}"#,
        )
        .expect("decode");
        assert_eq!(event.activator(), Some(&PlayerId::new("a")));

        let legacy: PowerupEventPayload = parse(r#"{"kind": "freeze", "by": "b"}"#).expect("decode");
        assert_eq!(legacy.activator(), Some(&PlayerId::new("b")));
        assert_eq!(legacy.powerup, Some(PowerupKind::Freeze));
    }

    #[test]
    fn test_bonus_timer_merges_both_forms() {
        let payload: BonusTimerPayload = parse(
            r#"{"timers": {"a": 4.5}, "players": [{"player_id": "b", "bonus_time": 7}, {"bonus_time": 1}]}"#,
        )
        .expect("decode");
        assert_eq!(
            payload.entries(),
            vec![(PlayerId::new("a"), 4), (PlayerId::new("b"), 7)]
        );
    }

    #[test]
    fn test_nested_entries_fold_their_own_aliases() {
        let update: LobbyUpdate = parse(
            r#"{"players": [{"id": "p1", "player_id": "stale", "username": "Ada", "name": null}], "size": 5, "board_size": 4}"#,
        )
        .expect("decode");
        let players = update.players.expect("players");
        assert_eq!(players[0].id, Some(PlayerId::new("p1")));
        assert_eq!(players[0].name.as_deref(), Some("Ada"));
        assert_eq!(update.board_size, Some(4));

        let end: GameEndPayload = parse(
            r#"{"final_scores": [{"id": "p1", "player_id": "p1", "score": 9}], "word_awards": [{"word": "CAT", "score": 5, "points": 3}]}"#,
        )
        .expect("decode");
        assert_eq!(end.results.expect("results")[0].score, Some(9));
        assert_eq!(end.awards.expect("awards")[0].points, Some(3));
    }

    #[test]
    fn test_error_reason_falls_back() {
        let payload: ErrorPayload = parse("{}").expect("decode");
        assert_eq!(payload.reason(), "The session ended unexpectedly");
        let payload: ErrorPayload = parse(r#"{"reason": "Name taken"}"#).expect("decode");
        assert_eq!(payload.reason(), "Name taken");
    }
}

//! Reducer from inbound session messages to [`SessionState`].
//!
//! Snapshots (`lobby_update`, `game_state`) replace whole slices of state;
//! everything else patches. Payload fields are already normalized and
//! optional, so each handler applies whatever is present and skips the rest.

use std::time::{Duration, Instant};

use wordgrid_shared::{
    BoardSize, BoardUpdatePayload, BonusTimerPayload, Cell, GameEndPayload, GamePhase,
    GameStateSnapshot, LobbyUpdate, PlayAgainPayload, PlayerId, PlayerPayload,
    PowerupConsumedPayload, PowerupEventPayload, PowerupKind, ScoreUpdatePayload, ServerMessage,
    WaitingPhasePayload, WordResultPayload,
};

use super::session::{
    FinalResult, GameSummary, Player, SessionState, Timed, TransientTimings, WordAward,
    WordResult,
};

/// What applying one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Unknown kind, or nothing usable in the payload.
    Ignored,
    /// The server reported a session-level failure; the connection should be
    /// torn down and the reason shown.
    Teardown { reason: String },
}

impl ApplyOutcome {
    fn from_changed(changed: bool) -> Self {
        if changed {
            Self::Applied
        } else {
            Self::Ignored
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: SessionState,
    timings: TransientTimings,
}

impl SessionStore {
    pub fn new(timings: TransientTimings) -> Self {
        Self {
            state: SessionState::default(),
            timings,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn set_local_player(&mut self, id: Option<PlayerId>) {
        self.state.local_player = id;
    }

    /// Forget the session but keep who we are.
    pub fn reset(&mut self) {
        let local = self.state.local_player.take();
        self.state = SessionState {
            local_player: local,
            ..SessionState::default()
        };
    }

    /// Forget the session after the server refused us, keeping why.
    pub fn end(&mut self, reason: impl Into<String>) {
        self.reset();
        self.state.error = Some(reason.into());
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.next_deadline()
    }

    /// Clear timed effects that have lapsed at `now`. Returns whether anything
    /// changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        let state = &mut self.state;
        let before = state.blocked.len();
        state.blocked.retain(|_, until| *until > now);
        let mut changed = state.blocked.len() != before;

        if state.frozen_until.is_some_and(|until| until <= now) {
            state.frozen_until = None;
            changed = true;
        }
        if state.lock_consumed_until.is_some_and(|until| until <= now) {
            state.lock_consumed_until = None;
            changed = true;
        }
        if state.last_word.as_ref().is_some_and(|timed| timed.until <= now) {
            state.last_word = None;
            changed = true;
        }
        changed
    }

    pub fn apply(&mut self, message: ServerMessage, now: Instant) -> ApplyOutcome {
        match message {
            ServerMessage::LobbyUpdate(update) => self.on_lobby_update(update),
            ServerMessage::GameState(snapshot) => self.on_game_state(snapshot),
            ServerMessage::TimerUpdate(update) => match update.timer {
                Some(timer) => {
                    self.state.timer = timer;
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Ignored,
            },
            ServerMessage::WordResult(result) => self.on_word_result(result, now),
            ServerMessage::GameEnd(end) => self.on_game_end(end),
            ServerMessage::PowerupEvent(event) => self.on_powerup_event(event, now),
            ServerMessage::PowerupConsumed(consumed) => self.on_powerup_consumed(consumed),
            ServerMessage::BoardUpdate(update) => self.on_board_update(update, now),
            ServerMessage::ScoreUpdate(update) => self.on_score_update(update),
            ServerMessage::WaitingPhase(waiting) => self.on_waiting_phase(waiting),
            ServerMessage::PlayerTimeUp(time_up) => match time_up.player_id {
                Some(id) => {
                    self.mark_finished(&id);
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Ignored,
            },
            ServerMessage::BonusTimerUpdate(timers) => self.on_bonus_timers(timers),
            ServerMessage::PlayAgainUpdate(votes) => self.on_play_again(votes),
            ServerMessage::Error(error) => {
                let reason = error.reason().to_string();
                tracing::error!(reason = %reason, "Session error");
                self.state.error = Some(reason.clone());
                ApplyOutcome::Teardown { reason }
            }
            ServerMessage::Unknown { kind } => {
                tracing::debug!(kind = %kind, "Ignoring unknown message kind");
                ApplyOutcome::Ignored
            }
        }
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn on_lobby_update(&mut self, update: LobbyUpdate) -> ApplyOutcome {
        let state = &mut self.state;
        state.clear_round_transients();
        state.phase = match update.phase {
            Some(GamePhase::Unknown) | None => GamePhase::Lobby,
            Some(phase) => phase,
        };
        if let Some(players) = update.players {
            state.players = merge_roster(&[], players);
        }
        if let Some(host) = update.host {
            state.host = Some(host);
        }
        if let Some(size) = update.board_size {
            set_board_size(state, size);
        }
        ApplyOutcome::Applied
    }

    fn on_game_state(&mut self, snapshot: GameStateSnapshot) -> ApplyOutcome {
        let state = &mut self.state;
        if let Some(board) = snapshot.board {
            state.board = board;
        }
        if let Some(size) = snapshot.board_size {
            set_board_size(state, size);
        }
        if let Some(timer) = snapshot.timer {
            state.timer = timer;
        }
        if let Some(players) = snapshot.players {
            state.players = merge_roster(&state.players, players);
        }
        match snapshot.phase {
            Some(GamePhase::Playing) if state.self_finished => {
                state.phase = GamePhase::Waiting;
            }
            Some(GamePhase::Playing) => {
                if !matches!(state.phase, GamePhase::Playing | GamePhase::Waiting) {
                    start_round(state);
                }
                state.phase = GamePhase::Playing;
            }
            Some(GamePhase::Unknown) | None => {}
            Some(phase) => state.phase = phase,
        }
        ApplyOutcome::Applied
    }

    // =========================================================================
    // Round events
    // =========================================================================

    fn on_word_result(&mut self, result: WordResultPayload, now: Instant) -> ApplyOutcome {
        if let Some(player) = &result.player_id {
            if self.state.local_player.is_some() && !self.state.is_local(player) {
                return ApplyOutcome::Ignored;
            }
        }
        let value = WordResult {
            word: result.word.unwrap_or_default(),
            valid: result.valid.unwrap_or(false),
            points: result.points.unwrap_or(0),
            message: result.message,
            path: result.path.unwrap_or_default(),
        };
        self.state.last_word = Some(Timed {
            value,
            until: now + self.timings.word_result,
        });
        ApplyOutcome::Applied
    }

    fn on_game_end(&mut self, end: GameEndPayload) -> ApplyOutcome {
        let results = end
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                Some(FinalResult {
                    player_id: row.player_id?,
                    name: row.name.unwrap_or_default(),
                    score: row.score.unwrap_or(0),
                    words: row.words.unwrap_or_default(),
                })
            })
            .collect();
        let awards = end
            .awards
            .unwrap_or_default()
            .into_iter()
            .filter_map(|award| {
                Some(WordAward {
                    word: award.word?,
                    player_id: award.player_id,
                    points: award.points.unwrap_or(0),
                    award: award.award,
                })
            })
            .collect();

        let state = &mut self.state;
        state.summary = Some(GameSummary {
            results,
            winner: end.winner,
            awards,
        });
        state.phase = GamePhase::Ended;
        state.self_finished = false;
        state.still_playing.clear();
        ApplyOutcome::Applied
    }

    fn on_powerup_event(&mut self, event: PowerupEventPayload, now: Instant) -> ApplyOutcome {
        let activator = event.activator().cloned();
        let by_local = activator
            .as_ref()
            .is_some_and(|id| self.state.is_local(id));

        match event.powerup {
            Some(PowerupKind::Freeze) => {
                let bonus = event.bonus_seconds.unwrap_or(self.timings.freeze_bonus_secs);
                if let Some(player) = activator.as_ref().and_then(|id| self.state.player_mut(id)) {
                    player.bonus_time = player.bonus_time.saturating_add(bonus);
                }
                if by_local {
                    let window = seconds_or(event.duration, self.timings.freeze);
                    self.state.frozen_until = Some(now + window);
                }
                ApplyOutcome::Applied
            }
            Some(PowerupKind::BlowUp) => {
                if by_local {
                    return ApplyOutcome::Applied;
                }
                let until = now + seconds_or(event.duration, self.timings.blocked_cells);
                let state = &mut self.state;
                let mut blocked_any = false;
                for cell in event.cells.unwrap_or_default() {
                    if !on_board(state, cell) {
                        tracing::debug!(cell = %cell, "Ignoring blocked cell outside the board");
                        continue;
                    }
                    state.blocked.insert(cell, until);
                    blocked_any = true;
                }
                ApplyOutcome::from_changed(blocked_any)
            }
            Some(PowerupKind::Lock) => {
                if by_local {
                    self.state.lock_armed = true;
                }
                ApplyOutcome::Applied
            }
            Some(PowerupKind::Unknown) | None => {
                tracing::debug!("Ignoring powerup event without a known powerup");
                ApplyOutcome::Ignored
            }
        }
    }

    fn on_powerup_consumed(&mut self, consumed: PowerupConsumedPayload) -> ApplyOutcome {
        let Some(id) = consumed.player_id else {
            return ApplyOutcome::Ignored;
        };
        let Some(player) = self.state.player_mut(&id) else {
            tracing::debug!(player = %id, "powerup_consumed for player not in roster");
            return ApplyOutcome::Ignored;
        };
        if let Some(inventory) = consumed.powerups {
            player.powerups = inventory;
            return ApplyOutcome::Applied;
        }
        let Some(kind) = consumed.powerup else {
            return ApplyOutcome::Ignored;
        };
        match player.powerups.iter().position(|held| *held == kind) {
            Some(index) => {
                player.powerups.remove(index);
                ApplyOutcome::Applied
            }
            None => ApplyOutcome::Ignored,
        }
    }

    fn on_board_update(&mut self, update: BoardUpdatePayload, now: Instant) -> ApplyOutcome {
        let protected = self
            .state
            .local_player
            .as_ref()
            .is_some_and(|id| update.protects(id));

        let state = &mut self.state;
        match update.old_board {
            Some(old_board) if protected => {
                tracing::info!("Board shuffle blocked by lock");
                if state.board.is_empty() {
                    state.board = old_board;
                }
                state.lock_armed = false;
                state.lock_consumed_until = Some(now + self.timings.lock_consumed);
                ApplyOutcome::Applied
            }
            _ => match update.board {
                Some(board) => {
                    state.board = board;
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Ignored,
            },
        }
    }

    fn on_score_update(&mut self, update: ScoreUpdatePayload) -> ApplyOutcome {
        let Some(id) = update.player_id else {
            return ApplyOutcome::Ignored;
        };
        let Some(player) = self.state.player_mut(&id) else {
            tracing::debug!(player = %id, "score_update for player not in roster");
            return ApplyOutcome::Ignored;
        };
        let target = match (update.score, update.delta) {
            (Some(score), _) => Some(score),
            (None, Some(delta)) => {
                let total = i64::from(player.score).saturating_add(delta);
                Some(u32::try_from(total.max(0)).unwrap_or(u32::MAX))
            }
            (None, None) => None,
        };
        if let Some(score) = target {
            if score < player.score {
                tracing::debug!(player = %id, from = player.score, to = score, "Ignoring score decrease");
            }
            player.score = player.score.max(score);
        }
        if let Some(kind) = update.powerup.filter(|kind| *kind != PowerupKind::Unknown) {
            player.powerups.push(kind);
        }
        ApplyOutcome::Applied
    }

    fn on_waiting_phase(&mut self, waiting: WaitingPhasePayload) -> ApplyOutcome {
        let finished = waiting
            .player_id
            .or_else(|| self.state.local_player.clone());
        if let Some(id) = finished {
            self.mark_finished(&id);
        }
        if let Some(still_playing) = waiting.still_playing {
            let state = &mut self.state;
            state.still_playing = still_playing.into_iter().collect();
            if let Some(local) = &state.local_player {
                if state.phase != GamePhase::Lobby && !state.still_playing.contains(local) {
                    state.self_finished = true;
                    state.phase = GamePhase::Waiting;
                }
            }
        }
        ApplyOutcome::Applied
    }

    fn mark_finished(&mut self, id: &PlayerId) {
        let state = &mut self.state;
        state.still_playing.remove(id);
        if state.is_local(id) {
            tracing::info!("Out of time, waiting for other players");
            state.self_finished = true;
            state.phase = GamePhase::Waiting;
        }
    }

    fn on_bonus_timers(&mut self, timers: BonusTimerPayload) -> ApplyOutcome {
        let state = &mut self.state;
        let mut changed = false;
        for (id, seconds) in timers.entries() {
            if !state.still_playing.contains(&id) {
                continue;
            }
            if let Some(player) = state.player_mut(&id) {
                player.bonus_time = seconds;
                changed = true;
            }
        }
        ApplyOutcome::from_changed(changed)
    }

    fn on_play_again(&mut self, votes: PlayAgainPayload) -> ApplyOutcome {
        match votes.players {
            Some(players) => {
                self.state.play_again = players.into_iter().collect();
                ApplyOutcome::Applied
            }
            None => ApplyOutcome::Ignored,
        }
    }
}

/// Build a new roster from a snapshot. Fields the snapshot omits keep the
/// value from the previous entry with the same id.
/// Build the roster from `incoming`, in its order. Fields an entry leaves out
/// keep their value from `previous`; pass an empty slice to replace wholesale.
fn merge_roster(previous: &[Player], incoming: Vec<PlayerPayload>) -> Vec<Player> {
    incoming
        .into_iter()
        .filter_map(|entry| {
            let Some(id) = entry.id else {
                tracing::warn!("Dropping roster entry without an id");
                return None;
            };
            let mut player = previous
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .unwrap_or_else(|| Player::new(id));
            if let Some(name) = entry.name {
                player.name = name;
            }
            if let Some(avatar) = entry.avatar {
                player.avatar = avatar;
            }
            if let Some(ready) = entry.ready {
                player.ready = ready;
            }
            if let Some(score) = entry.score {
                player.score = score;
            }
            if let Some(powerups) = entry.powerups {
                player.powerups = powerups;
            }
            if let Some(bonus_time) = entry.bonus_time {
                player.bonus_time = bonus_time;
            }
            Some(player)
        })
        .collect()
}

fn set_board_size(state: &mut SessionState, size: u8) {
    match BoardSize::new(size) {
        Some(size) => state.board_size = size,
        None => tracing::warn!(size, "Ignoring unsupported board size"),
    }
}

/// Fresh round: everyone on the roster is playing and last round's leftovers go.
fn start_round(state: &mut SessionState) {
    state.clear_round_transients();
    state.still_playing = state.players.iter().map(|p| p.id.clone()).collect();
}

fn on_board(state: &SessionState, cell: Cell) -> bool {
    if state.board.is_empty() {
        cell.row < state.board_size.get() && cell.col < state.board_size.get()
    } else {
        state.board.tile(cell).is_some()
    }
}

fn seconds_or(seconds: Option<u32>, default: Duration) -> Duration {
    seconds.map_or(default, |s| Duration::from_secs(u64::from(s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordgrid_shared::ServerMessage;

    fn decode(kind: &str, data: &str) -> ServerMessage {
        ServerMessage::decode(&format!(r#"{{"type": "{kind}", "data": {data}}}"#))
            .expect("decode")
    }

    fn store_for(local: &str) -> SessionStore {
        let mut store = SessionStore::new(TransientTimings::default());
        store.set_local_player(Some(PlayerId::new(local)));
        store
    }

    const ROSTER: &str = r#"{"players": [
        {"id": "me", "name": "Ada", "avatar": "fox", "score": 0, "powerups": ["lock"]},
        {"id": "you", "name": "Bob", "avatar": "owl", "score": 0}
    ], "host": "me", "board_size": 4}"#;

    const GAME: &str = r#"{
        "board": [["A","B","C","D"],["E","F","G","H"],["I","J","K","L"],["M","N","O","Qu"]],
        "timer": 90, "phase": "playing",
        "players": [{"id": "me", "score": 3}, {"id": "you", "score": 5}]
    }"#;

    fn playing_store(now: Instant) -> SessionStore {
        let mut store = store_for("me");
        store.apply(decode("lobby_update", ROSTER), now);
        store.apply(decode("game_state", GAME), now);
        store
    }

    #[test]
    fn test_lobby_update_clears_blocked_and_frozen() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode("powerup_event", r#"{"powerup": "blow_up", "activating_player": "you", "cells": [[0,0],[1,1]]}"#),
            now,
        );
        store.apply(
            decode("powerup_event", r#"{"powerup": "freeze", "activating_player": "me"}"#),
            now,
        );
        store.apply(decode("player_time_up", r#"{"player_id": "you"}"#), now);
        assert_eq!(store.state().blocked.len(), 2);
        assert!(store.state().is_frozen());

        let outcome = store.apply(decode("lobby_update", ROSTER), now);

        assert_eq!(outcome, ApplyOutcome::Applied);
        let state = store.state();
        assert!(state.blocked.is_empty());
        assert!(!state.is_frozen());
        assert!(state.still_playing.is_empty());
        assert_eq!(state.phase, GamePhase::Lobby);
        // Roster fields the snapshot carries win; score comes from the snapshot.
        assert_eq!(state.player(&PlayerId::new("you")).map(|p| p.score), Some(0));
    }

    #[test]
    fn test_lobby_update_replaces_roster_wholesale() {
        let now = Instant::now();
        let mut store = store_for("me");
        store.apply(decode("lobby_update", r#"{"players": [{"id": "me", "name": "Ada"}]}"#), now);
        store.apply(
            decode("score_update", r#"{"player_id": "me", "score": 40, "earned_powerup": "freeze"}"#),
            now,
        );
        store.apply(
            decode("powerup_event", r#"{"powerup": "freeze", "activating_player": "me"}"#),
            now,
        );
        let me = store.state().local().cloned().expect("local player");
        assert_eq!((me.score, me.bonus_time), (40, 10));
        assert_eq!(me.powerups, vec![PowerupKind::Freeze]);

        // The snapshot omits score, inventory and bonus time.
        store.apply(
            decode("lobby_update", r#"{"players": [{"id": "me", "name": "Ada", "ready": false}]}"#),
            now,
        );

        let me = store.state().local().expect("local player");
        assert_eq!(me.name, "Ada");
        assert_eq!(me.score, 0);
        assert!(me.powerups.is_empty());
        assert_eq!(me.bonus_time, 0);
    }

    #[test]
    fn test_game_state_is_idempotent() {
        let now = Instant::now();
        let mut once = playing_store(now);
        let mut twice = playing_store(now);
        twice.apply(decode("game_state", GAME), now);

        assert_eq!(once.state(), twice.state());
        assert_eq!(once.apply(decode("game_state", GAME), now), ApplyOutcome::Applied);
        assert_eq!(once.state(), twice.state());
    }

    #[test]
    fn test_game_state_merges_partial_roster() {
        let now = Instant::now();
        let store = playing_store(now);
        let me = store.state().local().expect("local player");
        assert_eq!(me.name, "Ada");
        assert_eq!(me.score, 3);
        assert_eq!(me.powerups, vec![PowerupKind::Lock]);
        assert_eq!(store.state().timer, 90);
        assert_eq!(store.state().board.tile(Cell::new(3, 3)), Some("Qu"));
        assert_eq!(store.state().still_playing.len(), 2);
        assert!(store.state().is_host());
    }

    #[test]
    fn test_lock_blocks_shuffle_and_flag_expires() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode("powerup_event", r#"{"powerup": "lock", "activating_player": "me"}"#),
            now,
        );
        assert!(store.state().lock_armed);
        let board_before = store.state().board.clone();

        store.apply(
            decode(
                "board_update",
                r#"{"board": [["Z","Z","Z","Z"],["Z","Z","Z","Z"],["Z","Z","Z","Z"],["Z","Z","Z","Z"]],
                    "protected_players": ["me"],
                    "old_board": [["A","B","C","D"],["E","F","G","H"],["I","J","K","L"],["M","N","O","Qu"]]}"#,
            ),
            now,
        );

        let state = store.state();
        assert_eq!(state.board, board_before);
        assert!(!state.lock_armed);
        assert!(state.lock_consumed());
        assert_eq!(store.next_deadline(), Some(now + Duration::from_millis(1_500)));

        assert!(!store.expire(now + Duration::from_millis(1_400)));
        assert!(store.state().lock_consumed());
        assert!(store.expire(now + Duration::from_millis(1_500)));
        assert!(!store.state().lock_consumed());
    }

    #[test]
    fn test_unprotected_board_update_replaces_board() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode(
                "board_update",
                r#"{"new_board": [["Z","Y","X","W"],["Z","Z","Z","Z"],["Z","Z","Z","Z"],["Z","Z","Z","Z"]],
                    "protected_players": ["you"],
                    "old_board": [["A","B","C","D"],["E","F","G","H"],["I","J","K","L"],["M","N","O","Qu"]]}"#,
            ),
            now,
        );
        assert_eq!(store.state().board.tile(Cell::new(0, 1)), Some("Y"));
        assert!(!store.state().lock_consumed());
    }

    #[test]
    fn test_protected_with_empty_board_falls_back_to_old_board() {
        let now = Instant::now();
        let mut store = store_for("me");
        store.apply(
            decode(
                "board_update",
                r#"{"board": [["Z"]], "protected_players": ["me"], "old_board": [["A"]]}"#,
            ),
            now,
        );
        assert_eq!(store.state().board.tile(Cell::new(0, 0)), Some("A"));
    }

    #[test]
    fn test_blow_up_blocks_cells_for_others_only() {
        let now = Instant::now();
        let mut store = playing_store(now);
        let event = r#"{"powerup": "blow_up", "activating_player": "you", "cells": [[0,1],{"row": 2, "col": 2},[9,9]], "duration": 3}"#;
        assert_eq!(store.apply(decode("powerup_event", event), now), ApplyOutcome::Applied);
        let blocked: Vec<Cell> = store.state().blocked_cells().collect();
        assert_eq!(blocked, vec![Cell::new(0, 1), Cell::new(2, 2)]);

        assert!(store.expire(now + Duration::from_secs(3)));
        assert!(store.state().blocked.is_empty());

        let own = r#"{"powerup": "blow_up", "activating_player": "me", "cells": [[0,1]]}"#;
        store.apply(decode("powerup_event", own), now);
        assert!(store.state().blocked.is_empty());

        let anonymous = r#"{"powerup": "blowup", "cells": [[1,1]]}"#;
        store.apply(decode("powerup_event", anonymous), now);
        assert_eq!(store.state().blocked_cells().collect::<Vec<_>>(), vec![Cell::new(1, 1)]);
    }

    #[test]
    fn test_freeze_bonus_goes_to_activating_player() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode(
                "powerup_event",
                r#"{"powerup": "freeze", "activating_player": "you", "by": "me", "bonus_seconds": 7}"#,
            ),
            now,
        );
        let state = store.state();
        assert_eq!(state.player(&PlayerId::new("you")).map(|p| p.bonus_time), Some(7));
        assert_eq!(state.local().map(|p| p.bonus_time), Some(0));
        assert!(!state.is_frozen());

        store.apply(decode("powerup_event", r#"{"kind": "freeze", "by": "me"}"#), now);
        assert_eq!(store.state().local().map(|p| p.bonus_time), Some(10));
        assert_eq!(store.state().frozen_until, Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_score_never_decreases_and_carries_powerup() {
        let now = Instant::now();
        let mut store = playing_store(now);
        let you = PlayerId::new("you");

        store.apply(
            decode("score_update", r#"{"player_id": "you", "score": 12, "earned_powerup": "freeze"}"#),
            now,
        );
        let player = store.state().player(&you).expect("player");
        assert_eq!(player.score, 12);
        assert_eq!(player.powerups, vec![PowerupKind::Freeze]);

        store.apply(decode("score_update", r#"{"player_id": "you", "score": 4}"#), now);
        assert_eq!(store.state().player(&you).map(|p| p.score), Some(12));

        store.apply(decode("score_update", r#"{"player_id": "you", "points": 3}"#), now);
        assert_eq!(store.state().player(&you).map(|p| p.score), Some(15));

        store.apply(decode("score_update", r#"{"player_id": "you", "delta": -20}"#), now);
        assert_eq!(store.state().player(&you).map(|p| p.score), Some(15));
    }

    #[test]
    fn test_powerup_consumed_removes_one_or_replaces() {
        let now = Instant::now();
        let mut store = playing_store(now);
        let me = PlayerId::new("me");
        store.apply(decode("score_update", r#"{"player_id": "me", "powerup": "lock"}"#), now);
        assert_eq!(store.state().player(&me).map(|p| p.powerups.len()), Some(2));

        store.apply(decode("powerup_consumed", r#"{"player_id": "me", "powerup": "lock"}"#), now);
        assert_eq!(
            store.state().player(&me).map(|p| p.powerups.clone()),
            Some(vec![PowerupKind::Lock])
        );

        store.apply(
            decode("powerup_consumed", r#"{"by": "me", "inventory": ["freeze", "bomb"]}"#),
            now,
        );
        assert_eq!(
            store.state().player(&me).map(|p| p.powerups.clone()),
            Some(vec![PowerupKind::Freeze, PowerupKind::BlowUp])
        );
    }

    #[test]
    fn test_waiting_phase_and_time_up() {
        let now = Instant::now();
        let mut store = playing_store(now);

        store.apply(decode("player_time_up", r#"{"player_id": "you"}"#), now);
        assert!(!store.state().still_playing.contains(&PlayerId::new("you")));
        assert_eq!(store.state().phase, GamePhase::Playing);

        store.apply(decode("waiting_phase", "{}"), now);
        assert!(store.state().self_finished);
        assert_eq!(store.state().phase, GamePhase::Waiting);

        // A later snapshot saying "playing" does not pull us out of waiting.
        store.apply(decode("game_state", GAME), now);
        assert_eq!(store.state().phase, GamePhase::Waiting);
    }

    #[test]
    fn test_waiting_phase_explicit_list_wins() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode("waiting_phase", r#"{"player_id": "you", "still_playing": ["me", "you"]}"#),
            now,
        );
        let state = store.state();
        assert_eq!(state.still_playing.len(), 2);
        assert!(!state.self_finished);
    }

    #[test]
    fn test_bonus_timers_only_touch_players_still_playing() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(decode("player_time_up", r#"{"player_id": "you"}"#), now);
        store.apply(
            decode("bonus_timer_update", r#"{"timers": {"me": 6, "you": 9}}"#),
            now,
        );
        assert_eq!(store.state().local().map(|p| p.bonus_time), Some(6));
        assert_eq!(
            store.state().player(&PlayerId::new("you")).map(|p| p.bonus_time),
            Some(0)
        );
    }

    #[test]
    fn test_word_result_window_restarts() {
        let start = Instant::now();
        let mut store = playing_store(start);
        store.apply(
            decode("word_result", r#"{"word": "ABE", "valid": true, "points": 2}"#),
            start,
        );
        let later = start + Duration::from_millis(1_500);
        store.apply(
            decode("word_result", r#"{"word": "FIG", "is_valid": false, "reason": "not a word"}"#),
            later,
        );

        assert!(!store.expire(start + Duration::from_secs(2)));
        let result = store.state().word_result().expect("still visible");
        assert_eq!(result.word, "FIG");
        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some("not a word"));

        assert!(store.expire(later + Duration::from_secs(2)));
        assert!(store.state().word_result().is_none());
    }

    #[test]
    fn test_game_end_and_play_again() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.apply(
            decode(
                "game_end",
                r#"{"final_scores": [{"player_id": "you", "score": 20, "words": ["FIG"]}, {"name": "ghost"}],
                    "winner_id": "you",
                    "word_awards": [{"word": "FIG", "player_id": "you", "title": "Longest"}, {"points": 1}]}"#,
            ),
            now,
        );
        let state = store.state();
        assert_eq!(state.phase, GamePhase::Ended);
        let summary = state.summary.as_ref().expect("summary");
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.winner, Some(PlayerId::new("you")));
        assert_eq!(summary.awards.len(), 1);
        assert_eq!(summary.awards[0].award.as_deref(), Some("Longest"));

        store.apply(decode("play_again_update", r#"{"ready_players": ["you"]}"#), now);
        assert!(store.state().play_again.contains(&PlayerId::new("you")));
    }

    #[test]
    fn test_error_requests_teardown() {
        let now = Instant::now();
        let mut store = playing_store(now);
        let outcome = store.apply(decode("error", r#"{"message": "Session expired"}"#), now);
        assert_eq!(
            outcome,
            ApplyOutcome::Teardown {
                reason: "Session expired".into()
            }
        );
        assert_eq!(store.state().error.as_deref(), Some("Session expired"));
    }

    #[test]
    fn test_end_clears_session_and_keeps_reason() {
        let now = Instant::now();
        let mut store = playing_store(now);
        store.end("Kicked");

        let state = store.state();
        assert!(state.players.is_empty());
        assert!(state.board.is_empty());
        assert_eq!(state.local_player, Some(PlayerId::new("me")));
        assert_eq!(state.error.as_deref(), Some("Kicked"));
    }

    #[test]
    fn test_payloads_with_alias_and_canonical_key_apply() {
        let now = Instant::now();
        let mut store = playing_store(now);

        store.apply(
            decode("word_result", r#"{"word": "CAB", "valid": true, "points": 3, "score": 99}"#),
            now,
        );
        assert_eq!(store.state().word_result().map(|r| r.points), Some(3));

        let outcome = store.apply(
            decode("error", r#"{"message": "Session closed", "error": "SESSION_CLOSED"}"#),
            now,
        );
        assert_eq!(
            outcome,
            ApplyOutcome::Teardown {
                reason: "Session closed".into()
            }
        );
    }

    #[test]
    fn test_unknown_and_malformed_messages() {
        let now = Instant::now();
        let mut store = playing_store(now);
        let before = store.state().clone();

        assert_eq!(store.apply(decode("emote", r#"{"x": 1}"#), now), ApplyOutcome::Ignored);
        assert_eq!(
            store.apply(decode("timer_update", r#"{"timer": "soon"}"#), now),
            ApplyOutcome::Ignored
        );
        assert_eq!(store.state(), &before);

        // Bad size is skipped; the rest of the snapshot still applies.
        store.apply(decode("game_state", r#"{"board_size": 9, "timer": 12}"#), now);
        assert_eq!(store.state().board_size, before.board_size);
        assert_eq!(store.state().timer, 12);
    }
}

//! Client-side mirror of one session.
//!
//! Plain data; all mutation goes through [`super::SessionStore`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use wordgrid_shared::{Board, BoardSize, Cell, GamePhase, PlayerId, PowerupKind};

use crate::gesture::CellFilter;

/// How long short-lived round effects stay visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientTimings {
    pub word_result: Duration,
    pub freeze: Duration,
    pub blocked_cells: Duration,
    pub lock_consumed: Duration,
    /// Seconds granted to the freeze activator when the event does not say.
    pub freeze_bonus_secs: u32,
}

impl Default for TransientTimings {
    fn default() -> Self {
        Self {
            word_result: Duration::from_secs(2),
            freeze: Duration::from_secs(5),
            blocked_cells: Duration::from_secs(5),
            lock_consumed: Duration::from_millis(1_500),
            freeze_bonus_secs: 10,
        }
    }
}

/// A value that disappears at `until`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timed<T> {
    pub value: T,
    pub until: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub ready: bool,
    pub score: u32,
    pub powerups: Vec<PowerupKind>,
    pub bonus_time: u32,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: String::new(),
            avatar: String::new(),
            ready: false,
            score: 0,
            powerups: Vec::new(),
            bonus_time: 0,
        }
    }
}

/// Outcome of the local player's last submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordResult {
    pub word: String,
    pub valid: bool,
    pub points: u32,
    pub message: Option<String>,
    pub path: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalResult {
    pub player_id: PlayerId,
    pub name: String,
    pub score: u32,
    pub words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAward {
    pub word: String,
    pub player_id: Option<PlayerId>,
    pub points: u32,
    pub award: Option<String>,
}

/// End-of-game standings, kept until the next lobby snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameSummary {
    pub results: Vec<FinalResult>,
    pub winner: Option<PlayerId>,
    /// In the order the server reveals them.
    pub awards: Vec<WordAward>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub local_player: Option<PlayerId>,
    pub phase: GamePhase,
    pub board: Board,
    pub board_size: BoardSize,
    pub timer: u32,
    pub host: Option<PlayerId>,
    pub players: Vec<Player>,

    /// Local player ran out of time while others are still playing.
    pub self_finished: bool,
    pub still_playing: BTreeSet<PlayerId>,

    pub last_word: Option<Timed<WordResult>>,
    pub blocked: BTreeMap<Cell, Instant>,
    pub frozen_until: Option<Instant>,
    pub lock_armed: bool,
    pub lock_consumed_until: Option<Instant>,
    pub summary: Option<GameSummary>,
    pub play_again: BTreeSet<PlayerId>,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            local_player: None,
            phase: GamePhase::Lobby,
            board: Board::default(),
            board_size: BoardSize::default(),
            timer: 0,
            host: None,
            players: Vec::new(),
            self_finished: false,
            still_playing: BTreeSet::new(),
            last_word: None,
            blocked: BTreeMap::new(),
            frozen_until: None,
            lock_armed: false,
            lock_consumed_until: None,
            summary: None,
            play_again: BTreeSet::new(),
            error: None,
        }
    }
}

impl SessionState {
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub(crate) fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn local(&self) -> Option<&Player> {
        self.player(self.local_player.as_ref()?)
    }

    pub fn is_local(&self, id: &PlayerId) -> bool {
        self.local_player.as_ref() == Some(id)
    }

    pub fn is_host(&self) -> bool {
        self.local_player.is_some() && self.host == self.local_player
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_until.is_some()
    }

    pub fn lock_consumed(&self) -> bool {
        self.lock_consumed_until.is_some()
    }

    pub fn blocked_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.blocked.keys().copied()
    }

    pub fn word_result(&self) -> Option<&WordResult> {
        self.last_word.as_ref().map(|timed| &timed.value)
    }

    /// Drop every effect that belongs to one round.
    pub(crate) fn clear_round_transients(&mut self) {
        self.last_word = None;
        self.blocked.clear();
        self.frozen_until = None;
        self.lock_armed = false;
        self.lock_consumed_until = None;
        self.self_finished = false;
        self.still_playing.clear();
        self.summary = None;
        self.play_again.clear();
        self.error = None;
    }

    /// Earliest instant at which a timed effect lapses.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.blocked
            .values()
            .copied()
            .chain(self.frozen_until)
            .chain(self.lock_consumed_until)
            .chain(self.last_word.as_ref().map(|timed| timed.until))
            .min()
    }
}

impl CellFilter for SessionState {
    fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains_key(&cell)
    }
}

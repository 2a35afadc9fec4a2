//! Gesture-to-path recognition.
//!
//! Turns one press-drag-release pointer gesture into an ordered path of board
//! cells. Drag ambiguity is resolved in favour of the most recent intent:
//! stepping back onto the previous cell undoes one step, re-entering an older
//! cell cuts the path back to it, and anything not adjacent to the tail is
//! ignored.

use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

use wordgrid_shared::{Board, Cell, ClientMessage};

use crate::geometry::{GridLayout, Point};
use crate::infrastructure::messaging::CommandSink;

/// Paths shorter than this are discarded on release instead of submitted.
pub const MIN_SUBMIT_LEN: usize = 3;

/// Minimum spacing between two feedback pulses (tick sound, haptics).
pub const FEEDBACK_INTERVAL: Duration = Duration::from_millis(50);

/// Lookup for cells that may not be entered right now.
pub trait CellFilter {
    fn is_blocked(&self, cell: Cell) -> bool;
}

impl CellFilter for BTreeSet<Cell> {
    fn is_blocked(&self, cell: Cell) -> bool {
        self.contains(&cell)
    }
}

impl CellFilter for HashSet<Cell> {
    fn is_blocked(&self, cell: Cell) -> bool {
        self.contains(&cell)
    }
}

/// Filter that blocks nothing.
pub struct NoBlockedCells;

impl CellFilter for NoBlockedCells {
    fn is_blocked(&self, _cell: Cell) -> bool {
        false
    }
}

/// Everything a gesture step needs to know about the board right now.
pub struct GestureContext<'a> {
    pub layout: &'a GridLayout,
    pub blocked: &'a dyn CellFilter,
}

/// Effect of one pointer move on the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathChange {
    Unchanged,
    Extended(Cell),
    /// The tail cell was removed by stepping back onto its predecessor.
    Backtracked(Cell),
    /// The path was cut back to end at an earlier cell.
    Truncated { len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub change: PathChange,
    /// Whether the feedback channel should pulse for this change.
    pub feedback: bool,
}

/// A released path long enough to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub word: String,
    pub path: Vec<Cell>,
}

/// Rate limiter for the feedback side channel.
#[derive(Debug, Clone)]
struct FeedbackThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl FeedbackThrottle {
    fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathRecognizer {
    path: Vec<Cell>,
    active: bool,
    feedback: FeedbackThrottle,
}

impl Default for PathRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRecognizer {
    pub fn new() -> Self {
        Self {
            path: Vec::new(),
            active: false,
            feedback: FeedbackThrottle {
                interval: FEEDBACK_INTERVAL,
                last: None,
            },
        }
    }

    pub fn path(&self) -> &[Cell] {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begin a gesture. Returns whether it landed on an enterable cell; if not,
    /// the gesture stays inert until the next `start`.
    pub fn start(&mut self, point: Point, ctx: &GestureContext<'_>) -> bool {
        self.path.clear();
        self.active = false;

        match ctx.layout.cell_at(point) {
            Some(cell) if !ctx.blocked.is_blocked(cell) => {
                self.path.push(cell);
                self.active = true;
                true
            }
            _ => false,
        }
    }

    pub fn move_to(&mut self, point: Point, ctx: &GestureContext<'_>, now: Instant) -> MoveOutcome {
        let change = self.step(point, ctx);
        let feedback = change != PathChange::Unchanged && self.feedback.ready(now);
        MoveOutcome { change, feedback }
    }

    fn step(&mut self, point: Point, ctx: &GestureContext<'_>) -> PathChange {
        if !self.active {
            return PathChange::Unchanged;
        }
        let Some(cell) = ctx.layout.cell_at(point) else {
            return PathChange::Unchanged;
        };
        let Some(&last) = self.path.last() else {
            return PathChange::Unchanged;
        };
        if cell == last {
            return PathChange::Unchanged;
        }

        let len = self.path.len();
        if len >= 2 && self.path[len - 2] == cell {
            self.path.pop();
            return PathChange::Backtracked(last);
        }

        if !cell.is_adjacent(last) {
            return PathChange::Unchanged;
        }

        match self.path.iter().position(|&c| c == cell) {
            None if ctx.blocked.is_blocked(cell) => PathChange::Unchanged,
            None => {
                self.path.push(cell);
                PathChange::Extended(cell)
            }
            Some(index) if index + 2 < len => {
                self.path.truncate(index + 1);
                PathChange::Truncated { len: index + 1 }
            }
            Some(_) => PathChange::Unchanged,
        }
    }

    /// Finish the gesture. Paths of at least [`MIN_SUBMIT_LEN`] cells are sent
    /// as one `submit_word`; shorter ones are dropped silently. Gesture state is
    /// cleared either way.
    pub fn end(&mut self, board: &Board, sender: &dyn CommandSink) -> Option<Submission> {
        let path = std::mem::take(&mut self.path);
        let was_active = std::mem::replace(&mut self.active, false);
        if !was_active || path.len() < MIN_SUBMIT_LEN {
            return None;
        }

        let submission = Submission {
            word: board.word_for(&path),
            path,
        };
        let command = ClientMessage::SubmitWord {
            word: submission.word.clone(),
            path: submission.path.clone(),
        };
        match sender.send(command) {
            Ok(()) => Some(submission),
            Err(e) => {
                tracing::warn!(word = %submission.word, "Dropping word submission: {}", e);
                None
            }
        }
    }

    /// Abandon the gesture without submitting (pointer cancel, focus loss).
    pub fn cancel(&mut self) {
        self.path.clear();
        self.active = false;
    }
}

//! Board and session vocabulary shared by both ends of the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest and largest supported board edge length.
pub const MIN_BOARD_SIZE: u8 = 4;
pub const MAX_BOARD_SIZE: u8 = 6;

/// Accepted session code lengths (inclusive).
pub const SESSION_CODE_MIN_LEN: usize = 6;
pub const SESSION_CODE_MAX_LEN: usize = 8;

// =============================================================================
// Cells
// =============================================================================

/// A single board position.
///
/// Serialized as a `[row, col]` pair. The object form `{ "row": r, "col": c }`
/// is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "CellRepr", into = "(u8, u8)")]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Pair(u8, u8),
    Object { row: u8, col: u8 },
}

impl From<CellRepr> for Cell {
    fn from(repr: CellRepr) -> Self {
        match repr {
            CellRepr::Pair(row, col) | CellRepr::Object { row, col } => Cell { row, col },
        }
    }
}

impl From<Cell> for (u8, u8) {
    fn from(cell: Cell) -> Self {
        (cell.row, cell.col)
    }
}

impl Cell {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// King-move adjacency: both deltas at most one, not the same cell.
    pub fn is_adjacent(self, other: Cell) -> bool {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        dr <= 1 && dc <= 1 && (dr, dc) != (0, 0)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// =============================================================================
// Board
// =============================================================================

/// Square grid of tile strings, row-major.
///
/// Tiles are strings rather than chars because some tiles carry more than one
/// letter (e.g. "Qu").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board(Vec<Vec<String>>);

impl Board {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self(rows)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.0
    }

    pub fn tile(&self, cell: Cell) -> Option<&str> {
        self.0
            .get(usize::from(cell.row))
            .and_then(|row| row.get(usize::from(cell.col)))
            .map(String::as_str)
    }

    /// Concatenate the tiles along `path`. Cells outside the board contribute
    /// nothing.
    pub fn word_for(&self, path: &[Cell]) -> String {
        path.iter().filter_map(|cell| self.tile(*cell)).collect()
    }
}

impl From<Vec<Vec<&str>>> for Board {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// Validated board edge length (4, 5 or 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BoardSize(u8);

impl BoardSize {
    pub const DEFAULT: BoardSize = BoardSize(4);

    pub fn new(size: u8) -> Option<Self> {
        (MIN_BOARD_SIZE..=MAX_BOARD_SIZE)
            .contains(&size)
            .then_some(Self(size))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for BoardSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for BoardSize {
    type Error = String;

    fn try_from(size: u8) -> Result<Self, Self::Error> {
        Self::new(size).ok_or_else(|| format!("unsupported board size: {size}"))
    }
}

impl From<BoardSize> for u8 {
    fn from(size: BoardSize) -> Self {
        size.0
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque player identifier, generated client-side at join time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionCodeError {
    #[error("session code must be {min}-{max} characters, got {len}", min = SESSION_CODE_MIN_LEN, max = SESSION_CODE_MAX_LEN)]
    Length { len: usize },
    #[error("session code may only contain letters and digits")]
    InvalidCharacter,
}

/// Case-insensitive session code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    pub fn parse(raw: &str) -> Result<Self, SessionCodeError> {
        let code = raw.trim();
        let len = code.chars().count();
        if !(SESSION_CODE_MIN_LEN..=SESSION_CODE_MAX_LEN).contains(&len) {
            return Err(SessionCodeError::Length { len });
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionCodeError::InvalidCharacter);
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionCode {
    type Err = SessionCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = SessionCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Powerup kinds a player can hold and activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupKind {
    /// Grants the activating player bonus time.
    Freeze,
    /// Blocks a set of cells for every other player.
    #[serde(alias = "blowup", alias = "bomb")]
    BlowUp,
    /// Protects the activating player's board from the next shuffle.
    Lock,
    /// Kind not known to this client version.
    #[serde(other)]
    Unknown,
}

impl FromStr for PowerupKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freeze" => Ok(Self::Freeze),
            "blow_up" | "blowup" | "bomb" => Ok(Self::BlowUp),
            "lock" => Ok(Self::Lock),
            other => Err(format!("unknown powerup: {other}")),
        }
    }
}

/// Session phase as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Lobby,
    #[serde(alias = "in_progress", alias = "game")]
    Playing,
    /// Local player is out of time but others are still playing.
    Waiting,
    #[serde(alias = "finished", alias = "game_over")]
    Ended,
    #[serde(other)]
    Unknown,
}

/// Whether the connecting client creates the session or joins an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    Create,
    #[default]
    Join,
}

impl JoinMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinMode::Create => "create",
            JoinMode::Join => "join",
        }
    }
}

impl FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "join" => Ok(Self::Join),
            other => Err(format!("unknown join mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_king_move_adjacency() {
        let center = Cell::new(2, 2);
        assert!(center.is_adjacent(Cell::new(1, 1)));
        assert!(center.is_adjacent(Cell::new(3, 2)));
        assert!(!center.is_adjacent(center));
        assert!(!center.is_adjacent(Cell::new(4, 2)));
        assert!(!Cell::new(0, 0).is_adjacent(Cell::new(0, 2)));
    }

    #[test]
    fn test_cell_accepts_pair_and_object() {
        let pair: Cell = serde_json::from_str("[1, 3]").expect("pair");
        let object: Cell = serde_json::from_str(r#"{"row": 1, "col": 3}"#).expect("object");
        assert_eq!(pair, Cell::new(1, 3));
        assert_eq!(pair, object);
        assert_eq!(serde_json::to_string(&pair).expect("encode"), "[1,3]");
    }

    #[test]
    fn test_board_word_for_multi_letter_tiles() {
        let board = Board::from(vec![vec!["C", "Qu"], vec!["I", "T"]]);
        let word = board.word_for(&[Cell::new(1, 0), Cell::new(0, 1), Cell::new(1, 1)]);
        assert_eq!(word, "IQuT");
    }

    #[test]
    fn test_session_code_is_case_insensitive() {
        let code = SessionCode::parse(" ab12cd ").expect("valid code");
        assert_eq!(code.as_str(), "AB12CD");
        assert_eq!(code, SessionCode::parse("AB12CD").expect("valid code"));
    }

    #[test]
    fn test_session_code_rejects_bad_input() {
        assert_eq!(
            SessionCode::parse("abc"),
            Err(SessionCodeError::Length { len: 3 })
        );
        assert_eq!(
            SessionCode::parse("ab-12cd"),
            Err(SessionCodeError::InvalidCharacter)
        );
    }

    #[test]
    fn test_board_size_bounds() {
        assert!(BoardSize::new(3).is_none());
        assert_eq!(BoardSize::new(5).map(BoardSize::get), Some(5));
        assert!(BoardSize::new(7).is_none());
    }

    #[test]
    fn test_unknown_powerup_kind_is_tolerated() {
        let kind: PowerupKind = serde_json::from_str("\"teleport\"").expect("decode");
        assert_eq!(kind, PowerupKind::Unknown);
        let kind: PowerupKind = serde_json::from_str("\"blowup\"").expect("decode");
        assert_eq!(kind, PowerupKind::BlowUp);
    }
}

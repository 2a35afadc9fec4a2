//! Line commands for the headless client.

use std::str::FromStr;
use std::time::Instant;

use wordgrid_shared::{Board, BoardSize, Cell, PowerupKind};

use crate::geometry::{GridLayout, Point, Rect};
use crate::gesture::{CellFilter, GestureContext, PathRecognizer, Submission};
use crate::infrastructure::messaging::CommandSink;

/// Grid used to turn traced cells back into pointer positions.
const TRACE_RECT: Rect = Rect::new(20.0, 80.0, 300.0);
const TRACE_GAP_PX: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Ready,
    Size(BoardSize),
    Powerup(PowerupKind),
    Reset,
    Again,
    Trace(Vec<Cell>),
    Retry,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for ConsoleCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Empty);
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "ready" => Self::Ready,
            "size" => {
                let size = words
                    .next()
                    .and_then(|w| w.parse::<u8>().ok())
                    .and_then(BoardSize::new)
                    .ok_or(ParseError::Usage("size 4|5|6"))?;
                Self::Size(size)
            }
            "powerup" => {
                let kind = words
                    .next()
                    .and_then(|w| w.parse::<PowerupKind>().ok())
                    .ok_or(ParseError::Usage("powerup freeze|blow_up|lock"))?;
                Self::Powerup(kind)
            }
            "reset" => Self::Reset,
            "again" => Self::Again,
            "trace" => {
                let cells = words
                    .map(parse_cell)
                    .collect::<Option<Vec<_>>>()
                    .filter(|cells| !cells.is_empty())
                    .ok_or(ParseError::Usage("trace r,c r,c ..."))?;
                Self::Trace(cells)
            }
            "retry" => Self::Retry,
            "leave" | "quit" | "exit" => Self::Leave,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn parse_cell(word: &str) -> Option<Cell> {
    let (row, col) = word.split_once(',')?;
    Some(Cell::new(row.trim().parse().ok()?, col.trim().parse().ok()?))
}

/// Replay `cells` as one drag gesture through their centers and release it.
pub fn trace(
    cells: &[Cell],
    board: &Board,
    size: BoardSize,
    blocked: &dyn CellFilter,
    sink: &dyn CommandSink,
) -> Option<Submission> {
    let layout = GridLayout::new(TRACE_RECT, size.get(), TRACE_GAP_PX);
    let ctx = GestureContext {
        layout: &layout,
        blocked,
    };
    // Pointers report viewport positions; the recognizer wants them relative
    // to the grid.
    let pointer = |cell: Cell| {
        let center = layout.cell_center(cell);
        let viewport = Point::new(TRACE_RECT.left + center.x, TRACE_RECT.top + center.y);
        layout.rect.to_local(viewport)
    };
    let mut recognizer = PathRecognizer::new();
    let (first, rest) = cells.split_first()?;
    if !recognizer.start(pointer(*first), &ctx) {
        tracing::info!(cell = %first, "Trace does not start on a usable cell");
        return None;
    }
    for cell in rest {
        let outcome = recognizer.move_to(pointer(*cell), &ctx, Instant::now());
        tracing::debug!(cell = %cell, change = ?outcome.change, "Trace step");
    }
    recognizer.end(board, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::NoBlockedCells;
    use crate::infrastructure::messaging::MockCommandSink;
    use mockall::predicate::eq;
    use wordgrid_shared::ClientMessage;

    #[test]
    fn test_parse_commands() {
        assert_eq!("ready".parse(), Ok(ConsoleCommand::Ready));
        assert_eq!(
            "size 5".parse(),
            Ok(ConsoleCommand::Size(BoardSize::new(5).expect("size")))
        );
        assert_eq!(
            "powerup bomb".parse(),
            Ok(ConsoleCommand::Powerup(PowerupKind::BlowUp))
        );
        assert_eq!(
            "trace 0,0 0,1 1,1".parse(),
            Ok(ConsoleCommand::Trace(vec![
                Cell::new(0, 0),
                Cell::new(0, 1),
                Cell::new(1, 1)
            ]))
        );
        assert_eq!("  ".parse::<ConsoleCommand>(), Err(ParseError::Empty));
        assert!(matches!(
            "size 9".parse::<ConsoleCommand>(),
            Err(ParseError::Usage(_))
        ));
        assert!(matches!(
            "trace 0;0".parse::<ConsoleCommand>(),
            Err(ParseError::Usage(_))
        ));
        assert!(matches!(
            "dance".parse::<ConsoleCommand>(),
            Err(ParseError::Unknown(_))
        ));
    }

    #[test]
    fn test_trace_submits_word_once() {
        let board = Board::from(vec![
            vec!["C", "A", "T", "S"],
            vec!["O", "R", "E", "S"],
            vec!["D", "O", "G", "S"],
            vec!["E", "E", "L", "S"],
        ]);
        let cells = vec![Cell::new(0, 0), Cell::new(0, 1), Cell::new(0, 2)];

        let mut sink = MockCommandSink::new();
        sink.expect_send()
            .with(eq(ClientMessage::SubmitWord {
                word: "CAT".into(),
                path: cells.clone(),
            }))
            .times(1)
            .returning(|_| Ok(()));

        let submission = trace(
            &cells,
            &board,
            BoardSize::new(4).expect("size"),
            &NoBlockedCells,
            &sink,
        );
        assert_eq!(submission.map(|s| s.word), Some("CAT".to_string()));
    }

    #[test]
    fn test_short_trace_submits_nothing() {
        let board = Board::from(vec![vec!["A", "B"], vec!["C", "D"]]);
        let mut sink = MockCommandSink::new();
        sink.expect_send().times(0);

        let submission = trace(
            &[Cell::new(0, 0), Cell::new(1, 1)],
            &board,
            BoardSize::new(4).expect("size"),
            &NoBlockedCells,
            &sink,
        );
        assert!(submission.is_none());
    }
}

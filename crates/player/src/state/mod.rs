//! Client-side session state and the reducer that keeps it in step with the
//! server.

mod session;
mod store;

pub use session::{
    FinalResult, GameSummary, Player, SessionState, Timed, TransientTimings, WordAward,
    WordResult,
};
pub use store::{ApplyOutcome, SessionStore};

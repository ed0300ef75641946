//! Passive observation of arena votes
//!
//! Page-structure heuristics stay outside the core. Callers translate what
//! they see into [`PageEvent`]s; the observer only submits a match once it
//! holds a vote and both names.

pub mod arena;
pub mod capture;
pub mod labels;

pub use arena::{ArenaObserver, ObservationSink, PageEvent, RecordingSink};
pub use capture::{CaptureState, Observation, VoteCapture, DEFAULT_NAME_TIMEOUT};
pub use labels::{parse_model_heading, parse_vote_label, Side};

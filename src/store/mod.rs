//! Match store: persisted rating table and match history
//!
//! This module owns the leaderboard state, applies the rating engine to
//! submitted matches, and keeps both collections consistent under renames,
//! resets, and imports.

pub mod match_store;
pub mod normalize;
pub mod snapshot;

// Re-export commonly used types
pub use match_store::{ImportSummary, MatchStore};
pub use snapshot::{export_file_name, parse_snapshot, parse_snapshot_str, to_pretty_json};

//! Two-phase vote capture
//!
//! A vote click arrives before the page reveals which models were playing.
//! [`VoteCapture`] remembers the clicked outcome until both names are seen,
//! then emits exactly one [`Observation`].

use crate::types::Outcome;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default time to wait for names after a vote
pub const DEFAULT_NAME_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully resolved match seen on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub model_a: String,
    pub model_b: String,
    pub outcome: Outcome,
}

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingNames { outcome: Outcome, since: Instant },
}

/// State machine holding at most one pending vote
#[derive(Debug, Clone)]
pub struct VoteCapture {
    state: CaptureState,
    timeout: Duration,
}

impl Default for VoteCapture {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_TIMEOUT)
    }
}

impl VoteCapture {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: CaptureState::Idle,
            timeout,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, CaptureState::AwaitingNames { .. })
    }

    /// A vote button was clicked. A later click replaces an earlier pending one.
    pub fn vote(&mut self, outcome: Outcome, now: Instant) {
        if let CaptureState::AwaitingNames { outcome: previous, .. } = self.state {
            debug!("Replacing pending vote {} with {}", previous, outcome);
        }
        self.state = CaptureState::AwaitingNames {
            outcome,
            since: now,
        };
    }

    /// Both competitor names became visible.
    ///
    /// Emits an observation only when a vote is pending, has not timed out,
    /// and both names are non-empty after trimming.
    pub fn names_detected(&mut self, model_a: &str, model_b: &str, now: Instant) -> Option<Observation> {
        self.expire(now);
        let CaptureState::AwaitingNames { outcome, .. } = self.state else {
            return None;
        };

        let model_a = model_a.trim();
        let model_b = model_b.trim();
        if model_a.is_empty() || model_b.is_empty() {
            debug!("Names incomplete, still waiting");
            return None;
        }

        self.state = CaptureState::Idle;
        Some(Observation {
            model_a: model_a.to_string(),
            model_b: model_b.to_string(),
            outcome,
        })
    }

    /// The page navigated away. Any pending vote is discarded.
    pub fn navigated(&mut self) {
        if self.is_awaiting() {
            info!("Navigation discarded a pending vote");
        }
        self.state = CaptureState::Idle;
    }

    /// Drop the pending vote if it has waited too long. Returns true if it did.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.state {
            CaptureState::AwaitingNames { outcome, since }
                if now.saturating_duration_since(since) >= self.timeout =>
            {
                info!(
                    "Pending vote {} timed out after {}ms without model names",
                    outcome,
                    self.timeout.as_millis()
                );
                self.state = CaptureState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_then_names_emits_once() {
        let start = Instant::now();
        let mut capture = VoteCapture::default();
        assert!(capture.names_detected("a", "b", start).is_none());

        capture.vote(Outcome::BWins, start);
        let observation = capture
            .names_detected(" gpt-4o ", "claude", start + Duration::from_millis(300))
            .unwrap();
        assert_eq!(observation.model_a, "gpt-4o");
        assert_eq!(observation.outcome, Outcome::BWins);
        assert_eq!(capture.state(), CaptureState::Idle);

        assert!(capture.names_detected("gpt-4o", "claude", start).is_none());
    }

    #[test]
    fn test_partial_names_keep_waiting() {
        let start = Instant::now();
        let mut capture = VoteCapture::default();
        capture.vote(Outcome::Draw, start);

        assert!(capture.names_detected("gpt", "  ", start).is_none());
        assert!(capture.is_awaiting());
        assert!(capture.names_detected("gpt", "claude", start).is_some());
    }

    #[test]
    fn test_timeout_discards_vote() {
        let start = Instant::now();
        let mut capture = VoteCapture::new(Duration::from_secs(2));
        capture.vote(Outcome::AWins, start);

        assert!(!capture.expire(start + Duration::from_secs(1)));
        assert!(capture
            .names_detected("a", "b", start + Duration::from_secs(2))
            .is_none());
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_navigation_discards_vote() {
        let start = Instant::now();
        let mut capture = VoteCapture::default();
        capture.vote(Outcome::AWins, start);
        capture.navigated();
        assert!(capture.names_detected("a", "b", start).is_none());
    }

    #[test]
    fn test_latest_vote_wins() {
        let start = Instant::now();
        let mut capture = VoteCapture::default();
        capture.vote(Outcome::AWins, start);
        capture.vote(Outcome::Draw, start + Duration::from_millis(50));

        let observation = capture.names_detected("a", "b", start).unwrap();
        assert_eq!(observation.outcome, Outcome::Draw);
    }
}

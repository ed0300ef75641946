//! Arena page observer
//!
//! Page events (vote clicks, headings, tag names, navigation) are fed in by
//! whatever watches the page. Resolved matches are handed to an
//! [`ObservationSink`], normally the command bus.

use crate::command::bus::CommandClient;
use crate::command::messages::CommandResponse;
use crate::observer::capture::{Observation, VoteCapture};
use crate::observer::labels::{parse_model_heading, parse_vote_label, Side};
use crate::types::MatchSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Destination for resolved observations
#[async_trait]
pub trait ObservationSink: Send + Sync {
    async fn submit(&self, observation: Observation) -> CommandResponse;
}

#[async_trait]
impl ObservationSink for CommandClient {
    async fn submit(&self, observation: Observation) -> CommandResponse {
        self.submit_match(
            &observation.model_a,
            &observation.model_b,
            observation.outcome,
            MatchSource::Automated,
        )
        .await
    }
}

/// Something that happened on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    /// A button was clicked; only vote captions matter
    Click { label: String },
    /// A heading appeared, e.g. `"Model A: gpt-4o"`
    Heading { text: String },
    /// Both names read at once from the beta layout's model tags
    Names {
        #[serde(rename = "modelA")]
        model_a: String,
        #[serde(rename = "modelB")]
        model_b: String,
    },
    Navigation,
}

/// Drives the vote capture state machine from page events
pub struct ArenaObserver {
    capture: VoteCapture,
    sink: Arc<dyn ObservationSink>,
    model_a: Option<String>,
    model_b: Option<String>,
}

impl ArenaObserver {
    pub fn new(sink: Arc<dyn ObservationSink>, name_timeout: Duration) -> Self {
        Self {
            capture: VoteCapture::new(name_timeout),
            sink,
            model_a: None,
            model_b: None,
        }
    }

    pub fn capture(&self) -> &VoteCapture {
        &self.capture
    }

    /// Process one page event. Returns the sink's response when the event
    /// completed an observation.
    pub async fn handle_event(&mut self, event: PageEvent, now: Instant) -> Option<CommandResponse> {
        match event {
            PageEvent::Click { label } => {
                match parse_vote_label(&label) {
                    Some(outcome) => {
                        info!("Vote button clicked: {}, waiting for model names", outcome);
                        self.capture.vote(outcome, now);
                    }
                    None => debug!("Ignoring click on '{}'", label.trim()),
                }
                None
            }
            PageEvent::Heading { text } => {
                let (side, name) = parse_model_heading(&text)?;
                match side {
                    Side::A => self.model_a = Some(name),
                    Side::B => self.model_b = Some(name),
                }
                self.try_emit(now).await
            }
            PageEvent::Names { model_a, model_b } => {
                self.model_a = Some(model_a);
                self.model_b = Some(model_b);
                self.try_emit(now).await
            }
            PageEvent::Navigation => {
                self.capture.navigated();
                self.model_a = None;
                self.model_b = None;
                None
            }
        }
    }

    /// Expire a stale pending vote
    pub fn tick(&mut self, now: Instant) {
        self.capture.expire(now);
    }

    async fn try_emit(&mut self, now: Instant) -> Option<CommandResponse> {
        let (Some(model_a), Some(model_b)) = (&self.model_a, &self.model_b) else {
            return None;
        };
        let observation = self.capture.names_detected(model_a, model_b, now)?;

        info!(
            "Observed match: '{}' vs '{}', outcome {}",
            observation.model_a, observation.model_b, observation.outcome
        );
        let response = self.sink.submit(observation).await;
        if !response.is_success() {
            warn!("Observed match was rejected: {}", response.message);
        }
        // Names belong to the finished round
        self.model_a = None;
        self.model_b = None;
        Some(response)
    }
}

/// Sink that records observations, for tests
#[derive(Default)]
pub struct RecordingSink {
    pub observations: tokio::sync::Mutex<Vec<Observation>>,
}

#[async_trait]
impl ObservationSink for RecordingSink {
    async fn submit(&self, observation: Observation) -> CommandResponse {
        self.observations.lock().await.push(observation);
        CommandResponse::success("recorded")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::bus::command_channel;
    use crate::command::handler::LeaderboardCommandHandler;
    use crate::storage::InMemoryStore;
    use crate::store::MatchStore;
    use crate::types::Outcome;

    fn click(label: &str) -> PageEvent {
        PageEvent::Click {
            label: label.to_string(),
        }
    }

    fn heading(text: &str) -> PageEvent {
        PageEvent::Heading {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_vote_then_headings_submits_match() {
        let sink = Arc::new(RecordingSink::default());
        let mut observer = ArenaObserver::new(sink.clone(), Duration::from_secs(10));
        let now = Instant::now();

        assert!(observer.handle_event(click("👈  A is better"), now).await.is_none());
        assert!(observer.handle_event(heading("Model A: gpt-4o"), now).await.is_none());
        let response = observer
            .handle_event(heading("Model B: claude-3-opus"), now)
            .await
            .unwrap();
        assert!(response.is_success());

        let observations = sink.observations.lock().await;
        assert_eq!(
            *observations,
            vec![Observation {
                model_a: "gpt-4o".to_string(),
                model_b: "claude-3-opus".to_string(),
                outcome: Outcome::AWins,
            }]
        );
    }

    #[tokio::test]
    async fn test_names_without_vote_are_not_submitted() {
        let sink = Arc::new(RecordingSink::default());
        let mut observer = ArenaObserver::new(sink.clone(), Duration::from_secs(10));
        let now = Instant::now();

        let names = PageEvent::Names {
            model_a: "a".to_string(),
            model_b: "b".to_string(),
        };
        assert!(observer.handle_event(names, now).await.is_none());
        assert!(observer.handle_event(click("Regenerate"), now).await.is_none());
        assert!(sink.observations.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_navigation_and_timeout_discard() {
        let sink = Arc::new(RecordingSink::default());
        let mut observer = ArenaObserver::new(sink.clone(), Duration::from_secs(1));
        let now = Instant::now();

        observer.handle_event(click("Right is Better"), now).await;
        observer.handle_event(PageEvent::Navigation, now).await;
        observer.handle_event(heading("Model A: x"), now).await;
        observer.handle_event(heading("Model B: y"), now).await;

        observer.handle_event(click("It's a tie"), now).await;
        observer.tick(now + Duration::from_secs(2));
        assert!(!observer.capture().is_awaiting());

        assert!(sink.observations.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_observer_feeds_command_bus() {
        let store = Arc::new(MatchStore::with_default_calculator(Arc::new(
            InMemoryStore::new(),
        )));
        let (bus, client) = command_channel(
            Arc::new(LeaderboardCommandHandler::new(store.clone())),
            8,
        );
        bus.spawn();

        let mut observer = ArenaObserver::new(Arc::new(client), Duration::from_secs(10));
        let now = Instant::now();
        observer.handle_event(click("👉  B is better"), now).await;
        let response = observer
            .handle_event(
                PageEvent::Names {
                    model_a: "left".to_string(),
                    model_b: "right".to_string(),
                },
                now,
            )
            .await
            .unwrap();
        assert!(response.is_success(), "{:?}", response);

        let ratings = store.ratings().await.unwrap();
        assert_eq!(ratings["right"].score, 1016);
        assert_eq!(ratings["left"].score, 984);
    }

    #[test]
    fn test_page_event_json() {
        let event: PageEvent =
            serde_json::from_str(r#"{"event":"names","modelA":"a","modelB":"b"}"#).unwrap();
        assert_eq!(
            event,
            PageEvent::Names {
                model_a: "a".to_string(),
                model_b: "b".to_string()
            }
        );
        let event: PageEvent = serde_json::from_str(r#"{"event":"navigation"}"#).unwrap();
        assert_eq!(event, PageEvent::Navigation);
    }
}

//! Session lifecycle events and their synchronous publish/subscribe bus

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::session::{Player, ScoreEntry};

/// Notifications published by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    /// Player joined, carries the full record
    PlayerJoined(Player),

    PlayerQuit {
        id: String,
    },

    PlayerReady {
        id: String,
    },

    MatchStarted,

    MatchStopped,

    /// Scores of every joined player, in roster order
    PlayerScoreChanged {
        scores: Vec<ScoreEntry>,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::PlayerJoined(_) => "PLAYER_JOINED",
            SessionEvent::PlayerQuit { .. } => "PLAYER_QUIT",
            SessionEvent::PlayerReady { .. } => "PLAYER_READY",
            SessionEvent::MatchStarted => "MATCH_STARTED",
            SessionEvent::MatchStopped => "MATCH_STOPPED",
            SessionEvent::PlayerScoreChanged { .. } => "PLAYER_SCORE_CHANGED",
        }
    }
}

/// Event subscriber callback
pub type Subscriber = Box<dyn FnMut(&SessionEvent) + Send>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered, synchronous, multi-subscriber event bus.
///
/// `publish` returns only after every current subscriber ran, in subscription
/// order. Nothing is retained for late subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &SessionEvent) {
        trace!(event = event.name(), subscribers = self.subscribers.len(), "Publishing event");
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

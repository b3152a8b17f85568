//! Processing-status event bus.
//!
//! Dispatches and sequences emit events via [`EventBus::emit`]; progress
//! displays subscribe via [`EventBus::subscribe`]. Built on
//! [`tokio::sync::broadcast`], so a slow or absent listener never blocks
//! a dispatch.

use tokio::sync::broadcast;

use crate::team::TeamId;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A dispatch for this team began.
    TeamStarted { team: TeamId, models: usize },
    /// One model call in a team's dispatch settled.
    ModelFinished {
        team: TeamId,
        model: String,
        ok: bool,
    },
    /// Every model call for the team settled.
    TeamCompleted { team: TeamId },
    /// The team's dispatch could not start or did not finish.
    TeamFailed { team: TeamId, reason: String },
    /// A sequenced task hit its deadline.
    TaskTimedOut { index: usize, team: TeamId },
    /// A sequence stopped; `completed` of `total` tasks produced a response.
    SequenceFinished { completed: usize, total: usize },
}

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns the number of receivers that will see the event.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Future events only; nothing is replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

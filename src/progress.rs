//! Terminal status line fed by the event bus.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::events::{Event, EventBus};
use crate::team::TeamId;

/// Braille spinner frames.
const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const INTERVAL: Duration = Duration::from_millis(80);

#[derive(Debug, Clone, PartialEq, Eq)]
enum TeamState {
    Running { done: usize, total: usize },
    Completed,
    Failed,
    TimedOut,
}

/// Per-team status, folded from events.
#[derive(Debug, Default)]
struct Board {
    teams: BTreeMap<TeamId, TeamState>,
}

impl Board {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::TeamStarted { team, models } => {
                self.teams.insert(
                    *team,
                    TeamState::Running {
                        done: 0,
                        total: *models,
                    },
                );
            }
            Event::ModelFinished { team, .. } => {
                if let Some(TeamState::Running { done, .. }) = self.teams.get_mut(team) {
                    *done += 1;
                }
            }
            Event::TeamCompleted { team } => {
                self.teams.insert(*team, TeamState::Completed);
            }
            Event::TeamFailed { team, .. } => {
                self.teams.insert(*team, TeamState::Failed);
            }
            Event::TaskTimedOut { team, .. } => {
                self.teams.insert(*team, TeamState::TimedOut);
            }
            Event::SequenceFinished { .. } => {}
        }
    }

    fn line(&self) -> String {
        self.teams
            .iter()
            .map(|(team, state)| match state {
                TeamState::Running { done, total } => format!("{team} {done}/{total}"),
                TeamState::Completed => format!("{team} ✓"),
                TeamState::Failed => format!("{team} ✗"),
                TeamState::TimedOut => format!("{team} ⏱"),
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Draws a spinner plus per-team status on stderr until stopped.
pub struct Progress {
    handle: JoinHandle<()>,
    cancel: tokio::sync::watch::Sender<bool>,
}

impl Progress {
    pub fn start(events: &EventBus, message: &str) -> Self {
        let (cancel_tx, mut cancel_rx) = tokio::sync::watch::channel(false);
        let mut rx = events.subscribe();
        let message = message.to_string();

        let handle = tokio::spawn(async move {
            let mut board = Board::default();
            let mut i = 0;
            loop {
                let frame = FRAMES[i % FRAMES.len()];
                eprint!("\x1b[2K\r{frame} {message}  {}", board.line());
                let _ = std::io::stderr().flush();

                tokio::select! {
                    _ = tokio::time::sleep(INTERVAL) => i += 1,
                    event = rx.recv() => match event {
                        Ok(event) => board.apply(&event),
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    },
                    _ = cancel_rx.changed() => break,
                }
            }
            eprint!("\x1b[2K\r");
            let _ = std::io::stderr().flush();
        });

        Self {
            handle,
            cancel: cancel_tx,
        }
    }

    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        let _ = self.handle.await;
    }
}

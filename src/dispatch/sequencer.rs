//! Multi-task mode: queued (prompt, attachments, team) tasks run one at a time.
//!
//! Tasks start strictly in order with `inter_stagger` between starts. Each
//! dispatch runs on its own spawned task, in its own scope of the caller's
//! context, and is raced against `task_deadline`. When the deadline wins the
//! scope is abandoned: its calls are cancelled and anything it still reports
//! is dropped. Every task yields exactly one [`TeamResponse`], whatever
//! happens to it. Configuration problems are caught before the first task.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{DispatchContext, DispatchRequest, Dispatcher, ResponseKind, TeamResponse};
use crate::attachment::Attachment;
use crate::consts::{MAX_QUEUED_TASKS, human_duration};
use crate::error::{DispatchError, QueueError};
use crate::events::Event;
use crate::team::{Mode, TeamId};

/// A queued unit of work. Attachments are a snapshot, not the live list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub team: TeamId,
    pub prompt: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Task {
    pub fn new(team: TeamId, prompt: impl Into<String>) -> Self {
        Self {
            team,
            prompt: prompt.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    fn into_request(self, mode: Mode) -> DispatchRequest {
        DispatchRequest {
            prompt: self.prompt,
            attachments: self.attachments,
            team: self.team,
            mode,
        }
    }
}

/// FIFO of tasks waiting for a sequence run.
#[derive(Debug)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    limit: usize,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::with_limit(MAX_QUEUED_TASKS)
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            tasks: Vec::new(),
            limit,
        }
    }

    /// Append a task. Returns its index.
    pub fn push(&mut self, task: Task) -> Result<usize, QueueError> {
        if task.prompt.trim().is_empty() {
            return Err(QueueError::EmptyPrompt);
        }
        if self.tasks.len() >= self.limit {
            return Err(QueueError::Full(self.limit));
        }
        self.tasks.push(task);
        Ok(self.tasks.len() - 1)
    }

    /// Edit a queued task in place. Does not count against the limit.
    pub fn replace(&mut self, index: usize, task: Task) -> Result<(), QueueError> {
        if task.prompt.trim().is_empty() {
            return Err(QueueError::EmptyPrompt);
        }
        let slot = self
            .tasks
            .get_mut(index)
            .ok_or(QueueError::OutOfRange(index))?;
        *slot = task;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Task, QueueError> {
        if index >= self.tasks.len() {
            return Err(QueueError::OutOfRange(index));
        }
        Ok(self.tasks.remove(index))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Distinct teams in first-seen order.
    pub fn teams(&self) -> Vec<TeamId> {
        let mut teams = Vec::new();
        for task in &self.tasks {
            if !teams.contains(&task.team) {
                teams.push(task.team);
            }
        }
        teams
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Drain the queue for a run.
    pub fn take(&mut self) -> Vec<Task> {
        std::mem::take(&mut self.tasks)
    }
}

/// A sequence is done exactly when every task produced a response.
/// An empty run is trivially complete.
pub fn is_complete(task_count: usize, responses: &[TeamResponse]) -> bool {
    responses.len() == task_count
}

pub struct TaskSequencer {
    dispatcher: Dispatcher,
}

impl TaskSequencer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run `tasks` in order and return one response per task, in input order.
    ///
    /// `stop` is checked between tasks only: a task already dispatched is
    /// allowed to settle. A stopped run returns fewer responses than tasks.
    /// A missing credential or an empty model list fails the whole run
    /// before any call is made or any stagger is waited.
    pub async fn run_sequence(
        &self,
        ctx: &DispatchContext,
        tasks: Vec<Task>,
        mode: Mode,
        stop: &CancellationToken,
    ) -> Result<Vec<TeamResponse>, DispatchError> {
        for task in &tasks {
            if let Err(e) = self.dispatcher.preflight(task.team, mode) {
                tracing::error!(team = %task.team, error = %e, "task sequence rejected");
                return Err(e);
            }
        }

        let timings = self.dispatcher.timings();
        let total = tasks.len();
        let mut responses = Vec::with_capacity(total);
        tracing::info!(total, %mode, "starting task sequence");

        for (index, task) in tasks.into_iter().enumerate() {
            if index > 0 && !timings.inter_stagger.is_zero() {
                tokio::select! {
                    _ = stop.cancelled() => {}
                    _ = tokio::time::sleep(timings.inter_stagger) => {}
                }
            }
            if stop.is_cancelled() {
                tracing::info!(index, total, "sequence stopped before task");
                break;
            }

            let team = task.team;
            let request = task.into_request(mode);
            tracing::info!(index, %team, "starting task");

            let dispatcher = self.dispatcher.clone();
            let scope = ctx.scope();
            let task_ctx = scope.clone();
            let spawned = request.clone();
            let handle = tokio::spawn(async move { dispatcher.dispatch(&task_ctx, &spawned).await });

            let response = match tokio::time::timeout(timings.task_deadline, handle).await {
                Ok(Ok(Ok(response))) => response,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(index, %team, error = %e, "task failed");
                    TeamResponse::notice(&request, ResponseKind::Failed, format!("Error: {e}"))
                }
                Ok(Err(join_err)) => {
                    tracing::error!(index, %team, error = %join_err, "task aborted");
                    ctx.events().emit(Event::TeamFailed {
                        team,
                        reason: join_err.to_string(),
                    });
                    TeamResponse::notice(
                        &request,
                        ResponseKind::Failed,
                        format!("Error: {join_err}"),
                    )
                }
                Err(_) => {
                    scope.abandon();
                    tracing::warn!(index, %team, deadline = ?timings.task_deadline, "task timed out");
                    ctx.events().emit(Event::TaskTimedOut { index, team });
                    TeamResponse::notice(
                        &request,
                        ResponseKind::TimedOut,
                        format!(
                            "Error: Timed out after {}.",
                            human_duration(timings.task_deadline)
                        ),
                    )
                }
            };
            responses.push(response);
        }

        ctx.events().emit(Event::SequenceFinished {
            completed: responses.len(),
            total,
        });
        tracing::info!(completed = responses.len(), total, "task sequence finished");
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_empty_prompt() {
        let mut q = TaskQueue::new();
        assert_eq!(q.push(Task::new(TeamId::One, "  ")), Err(QueueError::EmptyPrompt));
        assert!(q.is_empty());
    }

    #[test]
    fn push_enforces_two_stage_limit() {
        let mut q = TaskQueue::new();
        for i in 0..MAX_QUEUED_TASKS {
            assert_eq!(q.push(Task::new(TeamId::One, format!("task {i}"))), Ok(i));
        }
        assert_eq!(
            q.push(Task::new(TeamId::Two, "one too many")),
            Err(QueueError::Full(MAX_QUEUED_TASKS))
        );
    }

    #[test]
    fn replace_at_limit_is_allowed() {
        let mut q = TaskQueue::with_limit(1);
        q.push(Task::new(TeamId::One, "old")).unwrap();
        q.replace(0, Task::new(TeamId::Four, "new")).unwrap();
        assert_eq!(q.tasks()[0].prompt, "new");
        assert_eq!(q.tasks()[0].team, TeamId::Four);
        assert_eq!(
            q.replace(3, Task::new(TeamId::One, "x")),
            Err(QueueError::OutOfRange(3))
        );
    }

    #[test]
    fn remove_keeps_order() {
        let mut q = TaskQueue::new();
        q.push(Task::new(TeamId::One, "a")).unwrap();
        q.push(Task::new(TeamId::Two, "b")).unwrap();
        q.push(Task::new(TeamId::Three, "c")).unwrap();
        assert_eq!(q.remove(1).unwrap().prompt, "b");
        let prompts: Vec<_> = q.tasks().iter().map(|t| t.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["a", "c"]);
        assert!(q.remove(5).is_err());
    }

    #[test]
    fn teams_are_distinct_in_order() {
        let mut q = TaskQueue::new();
        q.push(Task::new(TeamId::Three, "a")).unwrap();
        q.push(Task::new(TeamId::One, "b")).unwrap();
        q.push(Task::new(TeamId::Three, "c")).unwrap();
        assert_eq!(q.teams(), vec![TeamId::Three, TeamId::One]);
    }

    #[test]
    fn take_drains() {
        let mut q = TaskQueue::new();
        q.push(Task::new(TeamId::One, "a")).unwrap();
        assert_eq!(q.take().len(), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn completion_needs_all_tasks() {
        assert!(!is_complete(2, &[]));
    }

    #[test]
    fn empty_run_is_complete() {
        assert!(is_complete(0, &[]));
    }

    #[test]
    fn task_deserializes_without_attachments() {
        let task: Task = serde_json::from_str(r#"{"team": 2, "prompt": "go"}"#).unwrap();
        assert_eq!(task, Task::new(TeamId::Two, "go"));
    }
}

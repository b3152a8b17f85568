//! Fan-out dispatch for one team and aggregation of the answers.
//!
//! A dispatch resolves the team's models, formats the payload once, and
//! issues one call per model concurrently, the n-th call starting after
//! `n * intra_stagger`. Every call gets its own child cancellation token of
//! the caller's [`DispatchContext`], so a call's own timeout never touches
//! its siblings while [`DispatchContext::cancel_all`] reaches all of them.
//! The join waits for every outcome; failures become inline notices.

pub mod sequencer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::attachment::Attachment;
use crate::backend::{Backend, CompletionRequest};
use crate::config::{Settings, Timings};
use crate::error::{BackendError, DispatchError};
use crate::events::{Event, EventBus};
use crate::format::format_request;
use crate::label::{LabelTable, label_marker};
use crate::team::{Mode, TeamId, resolve};
use crate::usage::UsageTracker;

/// Separator between model blocks in a composite response.
pub const BLOCK_SEPARATOR: &str = "\n\n\n\n";

/// Caller-owned state shared by the dispatches it starts.
///
/// A context can be narrowed with [`Self::scope`]. Abandoning a scope
/// cancels its calls and silences it: nothing it still emits reaches the
/// event bus or the usage counters.
#[derive(Clone, Default)]
pub struct DispatchContext {
    cancel: CancellationToken,
    abandoned: Arc<AtomicBool>,
    events: Arc<EventBus>,
    usage: Arc<UsageTracker>,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Cancel every outstanding model call started from this context.
    /// Returns immediately; the calls settle as cancelled outcomes.
    pub fn cancel_all(&self) {
        tracing::info!("cancelling all in-flight model calls");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A fresh group token so new dispatches can run after [`Self::cancel_all`].
    pub fn reset(&mut self) {
        self.cancel = CancellationToken::new();
    }

    /// A child context for one dispatch. [`Self::cancel_all`] on the parent
    /// still reaches it; [`Self::abandon`] on the child does not reach the parent.
    pub fn scope(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            abandoned: Arc::new(AtomicBool::new(false)),
            events: Arc::clone(&self.events),
            usage: Arc::clone(&self.usage),
        }
    }

    /// Cancel this scope's calls and drop whatever it reports afterwards.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn emit(&self, event: Event) {
        if !self.is_abandoned() {
            self.events.emit(event);
        }
    }

    fn record_calls(&self, calls: usize) {
        if !self.is_abandoned() {
            self.usage.record_calls(calls);
        }
    }

    fn call_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

/// One prompt for one team.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    pub team: TeamId,
    pub mode: Mode,
}

impl DispatchRequest {
    pub fn new(prompt: impl Into<String>, team: TeamId, mode: Mode) -> Self {
        Self {
            prompt: prompt.into(),
            attachments: Vec::new(),
            team,
            mode,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Origins of the attachments that have one, in order.
    pub fn attachment_refs(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter_map(|a| a.origin.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelResult {
    Text(String),
    Failure(BackendError),
}

/// The settled result of one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutcome {
    pub model_id: String,
    pub label: String,
    pub result: ModelResult,
}

impl ModelOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, ModelResult::Text(_))
    }

    /// Labelled header followed by the text or the failure notice.
    pub fn render(&self) -> String {
        let body = match &self.result {
            ModelResult::Text(text) => text.clone(),
            ModelResult::Failure(err) if err.is_cancelled() => err.to_string(),
            ModelResult::Failure(err) => format!("Error: {err}"),
        };
        format!("{}{BLOCK_SEPARATOR}{body}", label_marker(&self.label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Completed,
    TimedOut,
    Failed,
}

/// Everything one dispatch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: TeamId,
    pub prompt: String,
    /// Composite text, one labelled block per model in resolver order.
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub attachment_refs: Vec<String>,
    pub kind: ResponseKind,
    #[serde(skip)]
    pub outcomes: Vec<ModelOutcome>,
}

impl TeamResponse {
    /// A response standing in for a dispatch that produced no outcomes.
    pub fn notice(request: &DispatchRequest, kind: ResponseKind, message: String) -> Self {
        Self {
            team: request.team,
            prompt: request.prompt.clone(),
            response: message,
            timestamp: Utc::now(),
            attachment_refs: request.attachment_refs(),
            kind,
            outcomes: Vec::new(),
        }
    }
}

/// Join outcomes into one composite response, keeping their order.
pub fn compose(outcomes: &[ModelOutcome]) -> String {
    outcomes
        .iter()
        .map(ModelOutcome::render)
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// Runs dispatches against one backend. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
    labels: Arc<LabelTable>,
    system_instruction: Arc<str>,
    timings: Timings,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>, settings: &Settings) -> Self {
        Self {
            backend,
            labels: Arc::new(LabelTable::default()),
            system_instruction: Arc::from(settings.system_instruction.as_str()),
            timings: settings.timings,
        }
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.labels = Arc::new(labels);
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Run one dispatch. Only precondition failures are returned as errors;
    /// per-model failures are folded into the response.
    pub async fn dispatch(
        &self,
        ctx: &DispatchContext,
        request: &DispatchRequest,
    ) -> Result<TeamResponse, DispatchError> {
        let team = request.team;
        if let Err(e) = self.check_preconditions(request) {
            tracing::error!(%team, error = %e, "dispatch rejected");
            ctx.emit(Event::TeamFailed {
                team,
                reason: e.to_string(),
            });
            return Err(e);
        }
        let models = resolve(team, request.mode);

        let timestamp = Utc::now();
        let payload = format_request(&request.prompt, &request.attachments);
        tracing::info!(
            %team,
            mode = %request.mode,
            models = models.len(),
            attachments = request.attachments.len(),
            payload_chars = payload.len(),
            "dispatching"
        );
        ctx.emit(Event::TeamStarted {
            team,
            models: models.len(),
        });

        let calls = models
            .iter()
            .enumerate()
            .map(|(index, model)| self.call_model(ctx, team, index, model, &payload));
        let outcomes = join_all(calls).await;

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(%team, succeeded, failed = outcomes.len() - succeeded, "dispatch settled");
        // Only answered calls are billed.
        ctx.record_calls(succeeded);
        ctx.emit(Event::TeamCompleted { team });

        Ok(TeamResponse {
            team,
            prompt: request.prompt.clone(),
            response: compose(&outcomes),
            timestamp,
            attachment_refs: request.attachment_refs(),
            kind: ResponseKind::Completed,
            outcomes,
        })
    }

    /// Configuration checks that do not depend on the prompt: a credential
    /// is present and the team resolves to at least one model.
    pub fn preflight(&self, team: TeamId, mode: Mode) -> Result<(), DispatchError> {
        if !self.backend.has_credential() {
            return Err(DispatchError::MissingCredential);
        }
        if resolve(team, mode).is_empty() {
            return Err(DispatchError::EmptyModelList {
                team: team.to_string(),
                mode: mode.to_string(),
            });
        }
        Ok(())
    }

    fn check_preconditions(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        self.preflight(request.team, request.mode)?;
        if request.prompt.trim().is_empty() && request.attachments.is_empty() {
            return Err(DispatchError::EmptyRequest);
        }
        Ok(())
    }

    async fn call_model(
        &self,
        ctx: &DispatchContext,
        team: TeamId,
        index: usize,
        model: &str,
        payload: &str,
    ) -> ModelOutcome {
        let token = ctx.call_token();
        let request = CompletionRequest::new(model, &self.system_instruction, payload);
        let delay = self.timings.intra_stagger * index as u32;

        let call = async {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.timings.call_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.backend.complete(&request)).await {
                        Ok(result) => result,
                        Err(_) => {
                            // Only this call's token; siblings keep running.
                            token.cancel();
                            Err(BackendError::TimedOut {
                                model: model.to_string(),
                                after: limit,
                            })
                        }
                    }
                }
                None => self.backend.complete(&request).await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(BackendError::Cancelled),
            result = call => result,
        };

        let result = match result {
            Ok(text) => {
                tracing::debug!(%team, model, chars = text.len(), "model answered");
                ModelResult::Text(text)
            }
            Err(err) => {
                if err.is_cancelled() {
                    tracing::info!(%team, model, "model call cancelled");
                } else {
                    tracing::warn!(%team, model, error = %err, "model call failed");
                }
                ModelResult::Failure(err)
            }
        };

        ctx.emit(Event::ModelFinished {
            team,
            model: model.to_string(),
            ok: matches!(result, ModelResult::Text(_)),
        });

        ModelOutcome {
            model_id: model.to_string(),
            label: self.labels.label(model),
            result,
        }
    }
}

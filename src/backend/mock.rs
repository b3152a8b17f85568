use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{Backend, CompletionRequest, Credits};
use crate::error::BackendError;

/// What a scripted model does when called.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Fail with an upstream HTTP error.
    Fail { status: u16, message: String },
    /// Answer after a delay.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
}

/// A scripted backend for tests. Replies are keyed by model id, or by the
/// exact user payload when a per-payload script is set.
pub struct MockBackend {
    by_model: HashMap<String, Reply>,
    by_payload: HashMap<String, Reply>,
    fallback: Option<Reply>,
    has_credential: bool,
    credits: Option<Credits>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Every model answers `"<model> says hi"` unless scripted otherwise.
    pub fn new() -> Self {
        Self {
            by_model: HashMap::new(),
            by_payload: HashMap::new(),
            fallback: None,
            has_credential: true,
            credits: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(mut self, model: &str, reply: Reply) -> Self {
        self.by_model.insert(model.to_string(), reply);
        self
    }

    /// Script by user payload. Takes priority over per-model replies.
    pub fn reply_to_payload(mut self, payload: &str, reply: Reply) -> Self {
        self.by_payload.insert(payload.to_string(), reply);
        self
    }

    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn without_credential(mut self) -> Self {
        self.has_credential = false;
        self
    }

    pub fn with_credits(mut self, credits: Credits) -> Self {
        self.credits = Some(credits);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn script_for(&self, request: &CompletionRequest) -> Reply {
        if let Some(reply) = request
            .user_content()
            .and_then(|payload| self.by_payload.get(payload))
        {
            return reply.clone();
        }
        if let Some(reply) = self.by_model.get(&request.model) {
            return reply.clone();
        }
        self.fallback
            .clone()
            .unwrap_or_else(|| Reply::Text(format!("{} says hi", request.model)))
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        match self.script_for(request) {
            Reply::Text(text) => Ok(text),
            Reply::Fail { status, message } => Err(BackendError::Http {
                model: request.model.clone(),
                status,
                message,
            }),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Hang => std::future::pending().await,
        }
    }

    fn has_credential(&self) -> bool {
        self.has_credential
    }

    async fn credits(&self) -> Result<Option<Credits>, BackendError> {
        Ok(self.credits)
    }
}

pub mod mock;
pub mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One chat-completion call for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    /// System instruction followed by the formatted payload.
    pub fn new(model: impl Into<String>, system: &str, payload: &str) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(payload)],
        }
    }

    pub fn user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// Used/total credit counters reported by the upstream account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    pub used: f64,
    pub total: f64,
}

impl Credits {
    pub fn remaining(&self) -> f64 {
        (self.total - self.used).max(0.0)
    }
}

/// Something that can answer a chat completion. Could be the real API or a test script.
///
/// Implementations do not handle cancellation themselves; the dispatcher
/// drops the future when a call's token fires.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;

    /// Whether a credential is configured. Dispatch refuses to start without one.
    fn has_credential(&self) -> bool {
        true
    }

    /// Account usage, if the backend exposes it.
    async fn credits(&self) -> Result<Option<Credits>, BackendError> {
        Ok(None)
    }

    /// Cheap connectivity and credential check.
    async fn check(&self) -> bool {
        self.has_credential()
    }
}

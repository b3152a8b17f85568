//! Error types.
//!
//! Three layers: a [`BackendError`] belongs to one model call and is folded
//! into the composite response; a [`DispatchError`] is a precondition
//! failure that stops a dispatch before any call is made; the rest are
//! collaborator errors for attachments and the task queue.

use std::time::Duration;

use thiserror::Error;

use crate::consts::human_duration;

fn elapsed_text(after: &Duration) -> String {
    human_duration(*after)
}

/// Failure of a single backend call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Upstream answered with a non-success status.
    #[error("API call failed for {model} ({status}): {message}")]
    Http {
        model: String,
        status: u16,
        message: String,
    },

    /// Connection, TLS, or protocol failure.
    #[error("transport error for {model}: {message}")]
    Transport { model: String, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {model}: {message}")]
    Decode { model: String, message: String },

    /// The call's own timeout fired.
    #[error("{model} timed out after {}", elapsed_text(.after))]
    TimedOut { model: String, after: Duration },

    /// The call's cancellation token fired.
    #[error("Request was cancelled")]
    Cancelled,

    /// The backend refuses to run without a credential.
    #[error("no API key configured")]
    MissingCredential,
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

/// Precondition failures of a dispatch. Nothing was sent upstream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error(
        "no API key configured. Set OPENROUTER_API_KEY (or VITE_OPENROUTER_API_KEY) in the environment"
    )]
    MissingCredential,

    #[error("no models resolved for {team} in {mode} mode")]
    EmptyModelList { team: String, mode: String },

    #[error("nothing to send: prompt is empty and there are no attachments")]
    EmptyRequest,
}

impl DispatchError {
    /// Configuration errors are fixed by the operator, not by retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::MissingCredential | DispatchError::EmptyModelList { .. }
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttachmentError {
    #[error("no attachment with id {0}")]
    NotFound(String),

    #[error("attachment {name} already settled as {status}")]
    AlreadySettled { name: String, status: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("task limit reached: at most {0} tasks (two stages) are allowed")]
    Full(usize),

    #[error("task prompt is empty")]
    EmptyPrompt,

    #[error("no task at index {0}")]
    OutOfRange(usize),
}

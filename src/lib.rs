//! Send one prompt to up to four teams of LLM backends and collect the answers.
//!
//! A team fans out to one or more models depending on the operating mode.
//! [`dispatch::Dispatcher`] runs one team's calls concurrently and folds every
//! outcome, success or failure, into a labelled composite response;
//! [`dispatch::sequencer::TaskSequencer`] runs queued tasks one after another
//! with a stagger and a per-task deadline.

pub mod attachment;
pub mod backend;
pub mod banner;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod format;
pub mod label;
pub mod progress;
pub mod sink;
pub mod team;
pub mod usage;

pub use backend::Backend;
pub use dispatch::sequencer::{Task, TaskQueue, TaskSequencer};
pub use dispatch::{DispatchContext, DispatchRequest, Dispatcher, TeamResponse};
pub use error::{BackendError, DispatchError};
pub use team::{Mode, TeamId};

//! Attachment ingestion.
//!
//! [`AttachmentSet`] owns the live list of user-selected files. Each record
//! starts `Pending` and settles exactly once, to `Loaded` or `Failed`.
//! Dispatches never see the live list, only a [`AttachmentSet::snapshot`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttachmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    Pending,
    Loaded,
    Failed,
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttachmentStatus::Pending => "pending",
            AttachmentStatus::Loaded => "loaded",
            AttachmentStatus::Failed => "failed",
        })
    }
}

/// A named content blob handed to the formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub name: String,
    pub status: AttachmentStatus,
    pub content: Option<String>,
    /// Where the content came from (path or URL), if known.
    pub origin: Option<String>,
    /// Why loading failed, when `status` is `Failed`.
    pub error: Option<String>,
}

impl Attachment {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: AttachmentStatus::Pending,
            content: None,
            origin: None,
            error: None,
        }
    }

    /// Shorthand for an already-loaded attachment.
    pub fn loaded(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            status: AttachmentStatus::Loaded,
            content: Some(content.into()),
            ..Self::pending(name)
        }
    }

    /// Shorthand for an attachment whose load failed.
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: AttachmentStatus::Failed,
            error: Some(reason.into()),
            ..Self::pending(name)
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.status == AttachmentStatus::Loaded && self.content.is_some()
    }
}

/// The ingestor's live, ordered list of attachments.
#[derive(Debug, Default)]
pub struct AttachmentSet {
    items: Vec<Attachment>,
}

impl AttachmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending attachment and return its id.
    pub fn add(&mut self, name: impl Into<String>) -> Uuid {
        let attachment = Attachment::pending(name);
        let id = attachment.id;
        self.items.push(attachment);
        id
    }

    /// Settle a pending attachment as loaded.
    pub fn complete(
        &mut self,
        id: Uuid,
        content: String,
        origin: Option<String>,
    ) -> Result<(), AttachmentError> {
        let item = self.pending_mut(id)?;
        item.status = AttachmentStatus::Loaded;
        item.content = Some(content);
        item.origin = origin;
        Ok(())
    }

    /// Settle a pending attachment as failed.
    pub fn fail(&mut self, id: Uuid, reason: impl Into<String>) -> Result<(), AttachmentError> {
        let item = self.pending_mut(id)?;
        item.status = AttachmentStatus::Failed;
        item.error = Some(reason.into());
        Ok(())
    }

    fn pending_mut(&mut self, id: Uuid) -> Result<&mut Attachment, AttachmentError> {
        let item = self
            .items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AttachmentError::NotFound(id.to_string()))?;
        if item.status != AttachmentStatus::Pending {
            return Err(AttachmentError::AlreadySettled {
                name: item.name.clone(),
                status: item.status.to_string(),
            });
        }
        Ok(item)
    }

    /// Read a file from disk and settle its record. A read failure settles
    /// the record as failed rather than returning an error.
    pub async fn load_path(&mut self, path: &Path) -> Result<Uuid, AttachmentError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let id = self.add(name);

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                tracing::debug!(path = %path.display(), chars = content.chars().count(), "attachment loaded");
                self.complete(id, content, Some(path.display().to_string()))?;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "attachment failed to load");
                self.fail(id, e.to_string())?;
            }
        }
        Ok(id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Attachment> {
        let pos = self.items.iter().position(|a| a.id == id)?;
        Some(self.items.remove(pos))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<&Attachment> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A by-value copy for a dispatch. Later changes to the set do not leak in.
    pub fn snapshot(&self) -> Vec<Attachment> {
        self.items.clone()
    }
}

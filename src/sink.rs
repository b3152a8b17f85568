//! Result collection and export.
//!
//! [`ResultStore`] is the single place responses are appended to. Export
//! turns each response into a `Team N Response:` section and rewrites the
//! model label markers as markdown headings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::dispatch::TeamResponse;
use crate::label::replace_markers;

/// Ordered collection of finished responses. Appends happen between awaits
/// on the single task that owns the store, so no lock is needed.
#[derive(Debug, Default)]
pub struct ResultStore {
    responses: Vec<TeamResponse>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: TeamResponse) {
        self.responses.push(response);
    }

    pub fn extend(&mut self, responses: impl IntoIterator<Item = TeamResponse>) {
        self.responses.extend(responses);
    }

    /// Remove everything. Clearing an empty store does nothing.
    pub fn clear(&mut self) {
        self.responses.clear();
    }

    pub fn responses(&self) -> &[TeamResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        render_markdown(&self.responses)
    }

    /// Write the markdown export. `.md` is appended when missing.
    pub fn export(&self, path: &Path) -> Result<PathBuf> {
        let path = with_md_extension(path);
        std::fs::write(&path, self.to_markdown())
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), responses = self.len(), "responses exported");
        Ok(path)
    }
}

/// One section per response, label markers turned into `# LABEL` headings.
pub fn render_markdown(responses: &[TeamResponse]) -> String {
    responses
        .iter()
        .map(|r| {
            let body = replace_markers(&r.response, |label| format!("# {label}"));
            format!("Team {} Response:\n\n{}\n\n", r.team.number(), body)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn with_md_extension(path: &Path) -> PathBuf {
    if path.to_string_lossy().ends_with(".md") {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_os_string();
        s.push(".md");
        PathBuf::from(s)
    }
}

/// `Team1_3_Responses` for responses from teams 1 and 3.
pub fn default_export_name(responses: &[TeamResponse]) -> String {
    let teams: Vec<String> = responses
        .iter()
        .map(|r| r.team.number().to_string())
        .collect();
    format!("Team{}_Responses", teams.join("_"))
}

/// File name used when a task sequence completes.
pub fn task_results_name(now: DateTime<Utc>) -> String {
    format!("TaskResults_{}.md", now.format("%Y-%m-%dT%H-%M-%S"))
}

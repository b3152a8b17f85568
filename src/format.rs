//! Request formatting: prompt plus attachments into one user message.

use crate::attachment::{Attachment, AttachmentStatus};
use crate::consts::MAX_ATTACHMENT_CHARS;

pub const ATTACHMENTS_START: &str = "--- ATTACHED FILES ---";
pub const ATTACHMENTS_END: &str = "--- END OF ATTACHED FILES ---";

const FENCE: &str = "```";

/// Build the payload sent to every model in a dispatch.
///
/// With no attachments the prompt is returned unchanged. Otherwise a
/// delimited section follows the prompt with one block per attachment:
/// a `[File: NAME]` start marker, a fenced block typed by the file
/// extension holding at most [`MAX_ATTACHMENT_CHARS`] characters, and an
/// `[End of NAME]` end marker. Attachments that did not load are kept as
/// an inline error marker.
pub fn format_request(prompt: &str, attachments: &[Attachment]) -> String {
    format_request_with_cap(prompt, attachments, MAX_ATTACHMENT_CHARS)
}

pub fn format_request_with_cap(prompt: &str, attachments: &[Attachment], cap: usize) -> String {
    if attachments.is_empty() {
        return prompt.to_string();
    }

    let blocks: Vec<String> = attachments.iter().map(|a| attachment_block(a, cap)).collect();
    let section = format!(
        "\n\n{ATTACHMENTS_START}\n{}\n{ATTACHMENTS_END}\n",
        blocks.join("\n\n")
    );
    tracing::debug!(
        attachments = attachments.len(),
        section_chars = section.len(),
        "formatted attachments section"
    );

    let mut payload = String::with_capacity(prompt.len() + section.len());
    payload.push_str(prompt);
    payload.push_str(&section);
    payload
}

fn attachment_block(attachment: &Attachment, cap: usize) -> String {
    let name = &attachment.name;
    match (&attachment.status, &attachment.content) {
        (AttachmentStatus::Loaded, Some(content)) => {
            let lang = fence_language(name);
            let body = truncate_chars(content, cap);
            format!("\n[File: {name}]\n{FENCE}{lang}\n{body}\n{FENCE}\n[End of {name}]")
        }
        (AttachmentStatus::Failed, _) => match &attachment.error {
            Some(reason) => format!("\n[File: {name} - ERROR: {reason}]"),
            None => format!("\n[File: {name} - ERROR: No content loaded]"),
        },
        _ => format!("\n[File: {name} - ERROR: No content loaded]"),
    }
}

/// Lower-cased text after the last dot. A name without a dot is used whole
/// (`Makefile` gives `makefile`); only a trailing dot falls back to `text`.
fn fence_language(name: &str) -> String {
    name.rsplit('.')
        .next()
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "text".to_string())
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

//! Display labels for model ids, and the marker that carries them.
//!
//! A label is the part of the model id after the namespace `/`, upper-cased,
//! then passed through an ordered [`LabelTable`] so a whole model family can
//! collapse to one canonical name. Labels are embedded in composite
//! responses as [`label_marker`] headers; [`split_blocks`] recovers them.

use std::sync::LazyLock;

use regex::Regex;

pub const MARKER_OPEN: &str = r#"<span class="model-label">"#;
pub const MARKER_CLOSE: &str = "</span>";

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="model-label">(.*?)</span>"#).expect("marker regex is valid")
});

/// Ordered prefix rules. The first matching prefix wins.
#[derive(Debug, Clone)]
pub struct LabelTable {
    rules: Vec<(String, String)>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::empty().with_rule("DEEPSEEK", "DEEPSEEK R1")
    }
}

impl LabelTable {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule: labels starting with `prefix` become `canonical`.
    pub fn with_rule(mut self, prefix: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.rules
            .push((prefix.into().to_uppercase(), canonical.into()));
        self
    }

    pub fn label(&self, model_id: &str) -> String {
        // Only the segment right after the namespace; ids without one are used whole.
        let raw = model_id
            .split('/')
            .nth(1)
            .unwrap_or(model_id)
            .to_uppercase();

        self.rules
            .iter()
            .find(|(prefix, _)| raw.starts_with(prefix.as_str()))
            .map(|(_, canonical)| canonical.clone())
            .unwrap_or(raw)
    }
}

/// The header line placed above one model's block.
pub fn label_marker(label: &str) -> String {
    format!("{MARKER_OPEN}{label}{MARKER_CLOSE}")
}

/// Replace every label marker with `f(label)`.
pub fn replace_markers(text: &str, f: impl Fn(&str) -> String) -> String {
    MARKER_RE
        .replace_all(text, |caps: &regex::Captures<'_>| f(&caps[1]))
        .into_owned()
}

/// A block recovered from a composite response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledBlock {
    pub label: String,
    pub body: String,
}

/// Split a composite response back into `(label, body)` blocks, in order.
/// Text before the first marker is ignored.
pub fn split_blocks(text: &str) -> Vec<LabeledBlock> {
    let headers: Vec<_> = MARKER_RE.captures_iter(text).collect();
    headers
        .iter()
        .enumerate()
        .map(|(i, caps)| {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let next = headers
                .get(i + 1)
                .and_then(|c| c.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());
            LabeledBlock {
                label: caps[1].to_string(),
                body: text[whole..next].trim().to_string(),
            }
        })
        .collect()
}

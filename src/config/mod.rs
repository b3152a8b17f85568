//! Runtime settings, read from the environment and overridden by CLI flags.
//!
//! Nothing here is persisted. A missing API key is not an error at load
//! time: it is reported once at startup and every dispatch then fails fast.

use std::time::Duration;

use crate::consts::{
    API_KEY_ENV_VARS, DEFAULT_APP_TITLE, DEFAULT_BASE_URL, DEFAULT_REFERER, HTTP_TIMEOUT,
    INTER_TASK_STAGGER, INTRA_DISPATCH_STAGGER, SYSTEM_INSTRUCTION, TASK_DEADLINE,
};

/// Delays and deadlines used by the dispatcher and sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// Multiplied by the call index within one dispatch.
    pub intra_stagger: Duration,
    /// Waited before every task except the first.
    pub inter_stagger: Duration,
    /// Overall limit for one sequenced dispatch.
    pub task_deadline: Duration,
    /// Limit for a single model call. `None` means no per-call limit.
    pub call_timeout: Option<Duration>,
    /// HTTP client timeout.
    pub http_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            intra_stagger: INTRA_DISPATCH_STAGGER,
            inter_stagger: INTER_TASK_STAGGER,
            task_deadline: TASK_DEADLINE,
            call_timeout: None,
            http_timeout: HTTP_TIMEOUT,
        }
    }
}

impl Timings {
    /// No stagger at all, for tests and local backends.
    pub fn immediate() -> Self {
        Self {
            intra_stagger: Duration::ZERO,
            inter_stagger: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub referer: String,
    pub app_title: String,
    pub system_instruction: String,
    pub timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            app_title: DEFAULT_APP_TITLE.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            timings: Timings::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_key = API_KEY_ENV_VARS.iter().find_map(|&k| get(k));

        let secs = |key: &str| {
            get(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        let timings = Timings {
            task_deadline: secs("DEVTEAM_TASK_DEADLINE_SECONDS")
                .unwrap_or(defaults.timings.task_deadline),
            call_timeout: secs("DEVTEAM_CALL_TIMEOUT_SECONDS"),
            http_timeout: secs("OPENROUTER_TIMEOUT_SECONDS")
                .unwrap_or(defaults.timings.http_timeout),
            ..defaults.timings
        };

        Self {
            api_key,
            base_url: get("OPENROUTER_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            referer: get("OPENROUTER_REFERER").unwrap_or(defaults.referer),
            app_title: get("OPENROUTER_APP_TITLE").unwrap_or(defaults.app_title),
            system_instruction: defaults.system_instruction,
            timings,
        }
    }

    /// The first ten characters of the key, for diagnostics.
    pub fn api_key_hint(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(|k| format!("{}...", k.chars().take(10).collect::<String>()))
    }

    /// Log the credential state once. Missing credentials are loud but not fatal.
    pub fn report_credential(&self) {
        match self.api_key_hint() {
            Some(hint) => tracing::info!(key = %hint, "API key found and loaded"),
            None => tracing::error!(
                "API key is not configured. Set the {} environment variable.",
                API_KEY_ENV_VARS[0]
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let s = Settings::from_lookup(lookup(&[]));
        assert!(s.api_key.is_none());
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.referer, DEFAULT_REFERER);
        assert_eq!(s.app_title, DEFAULT_APP_TITLE);
        assert_eq!(s.timings, Timings::default());
    }

    #[test]
    fn primary_key_wins_over_legacy() {
        let s = Settings::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-primary"),
            ("VITE_OPENROUTER_API_KEY", "sk-legacy"),
        ]));
        assert_eq!(s.api_key.as_deref(), Some("sk-primary"));
    }

    #[test]
    fn legacy_key_is_accepted() {
        let s = Settings::from_lookup(lookup(&[("VITE_OPENROUTER_API_KEY", "sk-legacy")]));
        assert_eq!(s.api_key.as_deref(), Some("sk-legacy"));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let s = Settings::from_lookup(lookup(&[("OPENROUTER_API_KEY", "  ")]));
        assert!(s.api_key.is_none());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let s = Settings::from_lookup(lookup(&[("OPENROUTER_BASE_URL", "http://localhost:8080/v1/")]));
        assert_eq!(s.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn timing_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("DEVTEAM_TASK_DEADLINE_SECONDS", "30"),
            ("DEVTEAM_CALL_TIMEOUT_SECONDS", "10"),
            ("OPENROUTER_TIMEOUT_SECONDS", "not-a-number"),
        ]));
        assert_eq!(s.timings.task_deadline, Duration::from_secs(30));
        assert_eq!(s.timings.call_timeout, Some(Duration::from_secs(10)));
        assert_eq!(s.timings.http_timeout, HTTP_TIMEOUT);
        assert_eq!(s.timings.inter_stagger, INTER_TASK_STAGGER);
    }

    #[test]
    fn key_hint_is_truncated() {
        let s = Settings {
            api_key: Some("sk-or-v1-abcdefghijklmnop".to_string()),
            ..Settings::default()
        };
        assert_eq!(s.api_key_hint().unwrap(), "sk-or-v1-a...");
        assert!(Settings::default().api_key_hint().is_none());
    }

    #[test]
    fn immediate_timings_have_no_stagger() {
        let t = Timings::immediate();
        assert_eq!(t.intra_stagger, Duration::ZERO);
        assert_eq!(t.inter_stagger, Duration::ZERO);
        assert_eq!(t.task_deadline, TASK_DEADLINE);
    }
}

//! Project-wide constants.

use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Default chat-completion API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Attribution headers sent with every upstream call.
pub const DEFAULT_REFERER: &str = "https://devteam.app";
pub const DEFAULT_APP_TITLE: &str = "DEVTEAM";

/// Environment variables holding the upstream credential, in priority order.
pub const API_KEY_ENV_VARS: &[&str] = &["OPENROUTER_API_KEY", "VITE_OPENROUTER_API_KEY"];

/// Filter directive variable for the tracing subscriber.
pub const LOG_ENV_VAR: &str = "DEVTEAM_LOG";

/// System instruction attached to every model call.
pub const SYSTEM_INSTRUCTION: &str = "Process the following request with expertise and precision.";

/// Delay multiplied by the call index inside one dispatch.
pub const INTRA_DISPATCH_STAGGER: Duration = Duration::from_secs(1);

/// Pause between successive task starts in a sequence.
pub const INTER_TASK_STAGGER: Duration = Duration::from_secs(4);

/// Overall deadline for one sequenced dispatch.
pub const TASK_DEADLINE: Duration = Duration::from_secs(120);

/// Transport-level timeout for the HTTP client.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Hard per-attachment cap, in characters. Longer content is truncated.
pub const MAX_ATTACHMENT_CHARS: usize = 1024 * 1024;

/// Two stages of four teams.
pub const MAX_QUEUED_TASKS: usize = 8;

/// Fallback for `total_credits` when the credits endpoint omits it.
pub const DEFAULT_TOTAL_CREDITS: f64 = 10.0;

/// Render a duration the way failure notices show it ("2 minutes", "90 seconds").
pub fn human_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs.is_multiple_of(60) {
        let mins = secs / 60;
        if mins == 1 {
            "1 minute".to_string()
        } else {
            format!("{mins} minutes")
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else if secs == 0 {
        format!("{} ms", d.as_millis())
    } else {
        format!("{secs} seconds")
    }
}

//! Cached account usage.

use std::sync::Mutex;

use crate::backend::{Backend, Credits};

/// Last known used/total credit counters.
///
/// Refreshing is best effort: a failed query leaves the previous values in
/// place. Between refreshes, each dispatch bumps `used` by the number of
/// model calls it made so the display moves before the next query.
#[derive(Debug, Default)]
pub struct UsageTracker {
    credits: Mutex<Credits>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Credits {
        *self.credits.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_calls(&self, calls: usize) {
        let mut credits = self.credits.lock().unwrap_or_else(|e| e.into_inner());
        credits.used += calls as f64;
    }

    /// Query the backend. Returns whether the cached values were updated.
    pub async fn refresh(&self, backend: &dyn Backend) -> bool {
        match backend.credits().await {
            Ok(Some(fresh)) => {
                *self.credits.lock().unwrap_or_else(|e| e.into_inner()) = fresh;
                tracing::debug!(used = fresh.used, total = fresh.total, "credits refreshed");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch credits, keeping cached values");
                false
            }
        }
    }
}

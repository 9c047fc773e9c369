// Notification policy configuration
//
// The dedup window and the update-vs-publish gating split are product
// policy, not architecture: both came out of the original system's code
// and are kept configurable here so product changes do not require a
// rebuild of the routing logic.

use chrono::Duration;

/// Default suppression window between repeated notifications for the same
/// (user, document, event) tuple.
const DEFAULT_DEDUP_WINDOW_HOURS: i64 = 12;

/// Policy knobs for the notification pipeline.
#[derive(Debug, Clone)]
pub struct NotifyPolicy {
    /// Repeated triggers for the same (user, document, event) inside this
    /// window collapse to a single scheduled send.
    pub dedup_window: Duration,
    /// Notification kinds that require an enabled per-document subscription
    /// in addition to the team-wide setting. Kinds not listed here notify
    /// every opted-in team member.
    pub update_gated: Vec<String>,
}

impl NotifyPolicy {
    /// Create configuration from `NOTEWIRE_*` environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let dedup_window = std::env::var("NOTEWIRE_DEDUP_WINDOW_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_DEDUP_WINDOW_HOURS));

        let update_gated = std::env::var("NOTEWIRE_UPDATE_GATED_EVENTS")
            .ok()
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(default_update_gated);

        Self {
            dedup_window,
            update_gated,
        }
    }

    /// Whether `kind` is subscription-gated (update-class) rather than
    /// team-wide (publish-class).
    pub fn is_update_gated(&self, kind: &str) -> bool {
        self.update_gated.iter().any(|k| k == kind)
    }

    /// Set the dedup window
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Set the subscription-gated notification kinds
    pub fn with_update_gated(mut self, kinds: Vec<String>) -> Self {
        self.update_gated = kinds;
        self
    }
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self {
            dedup_window: Duration::hours(DEFAULT_DEDUP_WINDOW_HOURS),
            update_gated: default_update_gated(),
        }
    }
}

fn default_update_gated() -> Vec<String> {
    vec!["documents.update".to_string()]
}

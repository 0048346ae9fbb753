//! services/audit.rs
//! Action logbook for the capture path.
//!
//! - Appends one JSON object per line to `logbook/actions.jsonl`.
//! - Best effort: a failed append is logged through `tracing` and dropped,
//!   it never fails the operation being recorded.

use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::utils::logbook::{append_jsonl, count_events};

const ACTION_EVENT: &str = "action";

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    enabled: bool,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
        }
    }

    /// A log that records nothing and reports zero entries.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a generic action event.
    ///
    /// # Arguments
    /// * `agent`: Logical component name (e.g., `"tracker"`, `"receipts"`).
    /// * `action`: Short verb label (e.g., `"capture"`, `"ref_tag_fallback"`).
    /// * `details`: Arbitrary JSON payload.
    /// * `severity`: `"low" | "medium" | "high"`.
    pub fn record_action(&self, agent: &str, action: &str, details: &Value, severity: &str) {
        if !self.enabled {
            return;
        }
        let entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": ACTION_EVENT,
            "agent": agent,
            "action": action,
            "severity": severity,
            "details": details
        });
        if let Err(e) = append_jsonl(&self.path, &entry) {
            tracing::debug!(path = %self.path.display(), "audit append failed: {e:#}");
        }
    }

    /// Recorded actions in the logbook. Seed and other non-action lines do
    /// not count; zero when disabled or unreadable.
    pub fn entry_count(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        count_events(&self.path, ACTION_EVENT).unwrap_or_else(|e| {
            tracing::debug!(path = %self.path.display(), "audit count failed: {e:#}");
            0
        })
    }
}

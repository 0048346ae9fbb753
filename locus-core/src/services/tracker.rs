// src/services/tracker.rs
//! Context Tracker: one call to [`ContextTracker::capture`] produces one
//! [`ContextEvent`] and exactly one stored receipt, or an error and no receipt.
//!
//! capture flow:
//!   ref tag   → RefTagSource (failure → `LOCUS-<ACTION>-<ms>-ERROR`)
//!   before    → SnapshotSource (never fails; may be degraded)
//!   after     → before.merged(changes)
//!   hash      → 8-hex SHA-256 of canonical(after)
//!   receipt   → ReceiptGenerator (store failure propagates)

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::CaptureError;
use crate::model::{ChangeSet, ContextEvent};
use crate::services::audit::AuditLog;
use crate::services::receipts::ReceiptGenerator;
use crate::sources::clock::{Clock, rfc3339_millis};
use crate::sources::reftag::RefTagSource;
use crate::sources::snapshot::SnapshotSource;
use crate::utils::path::sanitize_token;

/// Suffix that marks a synthesized ref tag.
pub const FALLBACK_MARKER: &str = "-ERROR";

const RECEIPT_ID_PREFIX: &str = "CTX-";
const RECEIPT_ID_STAMP_LEN: usize = 15;

/// How receipt ids are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptIdScheme {
    /// `CTX-` plus a 15-char timestamp stamp. Captures in the same minute collide.
    #[default]
    Legacy,
    /// Legacy stamp plus a process-wide counter and a random suffix.
    Sequenced,
}

static RECEIPT_SEQ: AtomicU64 = AtomicU64::new(0);

impl ReceiptIdScheme {
    pub fn receipt_id(self, now: DateTime<Utc>) -> String {
        let legacy = legacy_receipt_id(now);
        match self {
            Self::Legacy => legacy,
            Self::Sequenced => {
                let n = RECEIPT_SEQ.fetch_add(1, Ordering::Relaxed);
                let rand = Uuid::new_v4().simple().to_string();
                format!("{legacy}-{n:06}-{}", &rand[..4])
            }
        }
    }
}

/// `CTX-` + the millisecond RFC 3339 stamp with `:` and `.` removed, cut to
/// 15 characters: `2024-05-06T07:08:09.123Z` → `CTX-2024-05-06T0708`.
pub fn legacy_receipt_id(now: DateTime<Utc>) -> String {
    let stamp: String = rfc3339_millis(now)
        .chars()
        .filter(|c| !matches!(c, ':' | '.'))
        .take(RECEIPT_ID_STAMP_LEN)
        .collect();
    format!("{RECEIPT_ID_PREFIX}{stamp}")
}

/// `LOCUS-<ACTION>-<ms>-ERROR`
pub fn fallback_ref_tag(action: &str, timestamp_ms: i64) -> String {
    format!(
        "LOCUS-{}-{timestamp_ms}{FALLBACK_MARKER}",
        sanitize_token(&action.to_uppercase())
    )
}

pub struct ContextTracker {
    ref_tags: Box<dyn RefTagSource>,
    snapshots: Box<dyn SnapshotSource>,
    generator: ReceiptGenerator,
    clock: Arc<dyn Clock>,
    receipt_ids: ReceiptIdScheme,
    note: String,
    audit: AuditLog,
}

impl ContextTracker {
    pub fn new(
        ref_tags: Box<dyn RefTagSource>,
        snapshots: Box<dyn SnapshotSource>,
        generator: ReceiptGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ref_tags,
            snapshots,
            generator,
            clock,
            receipt_ids: ReceiptIdScheme::default(),
            note: "Rust context capture".to_string(),
            audit: AuditLog::disabled(),
        }
    }

    pub fn with_receipt_ids(mut self, scheme: ReceiptIdScheme) -> Self {
        self.receipt_ids = scheme;
        self
    }

    /// Free-text note handed to the ref-tag source.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn generator(&self) -> &ReceiptGenerator {
        &self.generator
    }

    /// Capture with no mutation.
    pub fn capture_only(&self, action: &str, trigger: &str) -> Result<ContextEvent, CaptureError> {
        self.capture(action, trigger, ChangeSet::new())
    }

    /// Capture one context event and persist its receipt.
    ///
    /// Ref-tag and snapshot problems are absorbed (fallback tag, degraded
    /// snapshot). Only empty inputs and store failures are errors.
    pub fn capture(
        &self,
        action: &str,
        trigger: &str,
        changes: ChangeSet,
    ) -> Result<ContextEvent, CaptureError> {
        if action.trim().is_empty() {
            return Err(CaptureError::InvalidInput("action"));
        }
        if trigger.trim().is_empty() {
            return Err(CaptureError::InvalidInput("trigger"));
        }

        let now = self.clock.now();
        let timestamp = now.timestamp_millis();
        let ref_tag = self.ref_tag_for(action, timestamp);

        let context_before = self.snapshots.snapshot();
        if let Some(err) = context_before.error() {
            tracing::warn!(%ref_tag, "capturing with degraded snapshot: {err}");
            self.audit.record_action(
                "tracker",
                "snapshot_degraded",
                &json!({ "ref_tag": ref_tag, "error": err }),
                "medium",
            );
        }

        let context_after = context_before.merged(&changes);
        let hash = context_after.content_hash();

        let event = ContextEvent {
            ref_tag,
            timestamp,
            trigger: trigger.to_string(),
            context_before,
            changes,
            context_after,
            hash,
            receipt_id: self.receipt_ids.receipt_id(now),
        };

        self.generator.generate_context_receipt(&event)?;

        tracing::info!(
            ref_tag = %event.ref_tag,
            receipt_id = %event.receipt_id,
            hash = %event.hash,
            "context event captured"
        );
        self.audit.record_action(
            "tracker",
            "capture",
            &json!({
                "action": action,
                "trigger": event.trigger,
                "ref_tag": event.ref_tag,
                "receipt_id": event.receipt_id,
                "hash": event.hash,
                "fields_changed": event.changes.keys(),
            }),
            "low",
        );
        Ok(event)
    }

    fn ref_tag_for(&self, action: &str, timestamp: i64) -> String {
        match self.ref_tags.generate(action, &self.note) {
            Ok(tag) => tag,
            Err(e) => {
                let tag = fallback_ref_tag(action, timestamp);
                tracing::warn!(%action, fallback = %tag, "ref tag generation failed: {e}");
                self.audit.record_action(
                    "tracker",
                    "ref_tag_fallback",
                    &json!({ "action": action, "fallback": tag, "error": e.to_string() }),
                    "medium",
                );
                tag
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::clock::FixedClock;

    #[test]
    fn legacy_id_strips_separators_and_truncates() {
        // 2024-05-06T07:08:09.123Z
        let now = FixedClock::at_millis(1_714_979_289_123).now();
        assert_eq!(rfc3339_millis(now), "2024-05-06T07:08:09.123Z");
        assert_eq!(legacy_receipt_id(now), "CTX-2024-05-06T0708");
    }

    #[test]
    fn sequenced_ids_keep_prefix_and_differ() {
        let now = FixedClock::at_millis(1_714_979_289_123).now();
        let a = ReceiptIdScheme::Sequenced.receipt_id(now);
        let b = ReceiptIdScheme::Sequenced.receipt_id(now);
        assert!(a.starts_with("CTX-2024-05-06T0708-"));
        assert_ne!(a, b);
    }

    #[test]
    fn fallback_tag_is_marked_and_file_safe() {
        let tag = fallback_ref_tag("deploy now", 42);
        assert_eq!(tag, "LOCUS-DEPLOY_NOW-42-ERROR");
        assert!(crate::utils::path::is_safe_component(&tag));
    }
}

// src/services/receipts.rs
//! Receipt Generator: tamper-evidence fields plus the persisted document.
//!
//! | field                      | derivation                                               |
//! |----------------------------|----------------------------------------------------------|
//! | `checksum`                 | the event's own 8-hex `hash`                             |
//! | `cryptographic_signature`  | `sha256(ts:canonical(event):host)[..32]` `:` `sha256(sig:ref_tag)[..16]` |
//! | `audit_fingerprint`        | `sha256(ref_tag:ts:hash:now)[..12]`, see [`ProvenanceStamp`] |
//!
//! None of these are public-key signatures. The verify half of the signature
//! can be recomputed from the receipt alone; the signature half needs the
//! original event and host; the fingerprint cannot be recomputed at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::json;

use crate::error::{CaptureError, StoreError};
use crate::model::{
    Compliance, ContextEvent, DeltaSummary, GenerationContext, ProvenanceStamp, Receipt,
    SecurityProfile, Validation,
};
use crate::services::audit::AuditLog;
use crate::services::store::ReceiptStore;
use crate::sources::clock::{Clock, rfc3339_millis};
use crate::utils::digest::sha256_prefix;
use crate::utils::path::receipt_file_name;

pub const SIGNED_BY: &str = "locus_system";
pub const SIGNATURE_LEN: usize = 32;
pub const VERIFY_LEN: usize = 16;
pub const FINGERPRINT_LEN: usize = 12;

static HOST: Lazy<String> =
    Lazy::new(|| whoami::fallible::hostname().unwrap_or_else(|_| "localhost".into()));

/// Host name folded into every signature.
pub fn host_identity() -> &'static str {
    HOST.as_str()
}

/// `"<sig>:<verify>"` for an event signed on `host`.
pub fn cryptographic_signature(event: &ContextEvent, host: &str) -> String {
    let signing_input = format!("{}:{}:{}", event.timestamp, event.canonical_json(), host);
    let sig = sha256_prefix(&signing_input, SIGNATURE_LEN);
    let verify = verify_half(&sig, &event.ref_tag);
    format!("{sig}:{verify}")
}

/// Second half of a signature: binds the first half to its ref tag.
pub fn verify_half(sig: &str, ref_tag: &str) -> String {
    sha256_prefix(&format!("{sig}:{ref_tag}"), VERIFY_LEN)
}

/// Stamp the event with the wall clock reading `now`. Calling this again
/// later gives a different value; keep the stored one.
pub fn provenance_stamp(event: &ContextEvent, now: DateTime<Utc>) -> ProvenanceStamp {
    let input = format!(
        "{}:{}:{}:{}",
        event.ref_tag,
        event.timestamp,
        event.hash,
        rfc3339_millis(now)
    );
    ProvenanceStamp::new(sha256_prefix(&input, FINGERPRINT_LEN))
}

pub struct ReceiptGenerator {
    store: Arc<dyn ReceiptStore>,
    clock: Arc<dyn Clock>,
    host: String,
    signed_by: String,
    audit: AuditLog,
}

impl ReceiptGenerator {
    pub fn new(store: Arc<dyn ReceiptStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            host: host_identity().to_string(),
            signed_by: SIGNED_BY.to_string(),
            audit: AuditLog::disabled(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_signed_by(mut self, signed_by: impl Into<String>) -> Self {
        self.signed_by = signed_by.into();
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &Arc<dyn ReceiptStore> {
        &self.store
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Assemble the receipt without persisting it.
    pub fn build_receipt(&self, event: &ContextEvent) -> Receipt {
        Receipt {
            receipt_id: event.receipt_id.clone(),
            ref_tag: event.ref_tag.clone(),
            timestamp: event.timestamp,
            generation_context: GenerationContext {
                trigger: event.trigger.clone(),
                prior_state: event.context_before.clone(),
                current_state: event.context_after.clone(),
                delta_summary: DeltaSummary::from_changes(&event.changes),
            },
            validation: Validation {
                checksum: event.hash.clone(),
                cryptographic_signature: cryptographic_signature(event, &self.host),
                audit_fingerprint: provenance_stamp(event, self.clock.now()),
                timestamp: event.timestamp,
                signed_by: self.signed_by.clone(),
                compliance: Compliance::default(),
            },
            security: SecurityProfile::default(),
        }
    }

    /// Build the receipt and write it under the event's ref tag, replacing
    /// any receipt already stored there.
    pub fn generate_context_receipt(&self, event: &ContextEvent) -> Result<Receipt, CaptureError> {
        let receipt = self.build_receipt(event);
        let doc = serde_json::to_value(&receipt).map_err(|source| StoreError::Json {
            name: receipt_file_name(&event.ref_tag),
            source,
        })?;
        self.store.write(&receipt.ref_tag, &doc)?;

        tracing::info!(
            ref_tag = %receipt.ref_tag,
            receipt_id = %receipt.receipt_id,
            "context receipt generated"
        );
        self.audit.record_action(
            "receipts",
            "receipt_written",
            &json!({
                "ref_tag": receipt.ref_tag,
                "receipt_id": receipt.receipt_id,
                "checksum": receipt.validation.checksum,
            }),
            "low",
        );
        Ok(receipt)
    }
}

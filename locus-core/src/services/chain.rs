// src/services/chain.rs
//! Chain Validator: pass/fail over the stored receipts.
//!
//! Two checks exist:
//! - [`ChainCheck::Legacy`] keeps the historical predicate. It looks for
//!   `validation.signature` (16 chars), a field generated receipts do not
//!   carry, so any store with two or more generated receipts fails. An
//!   empty or single-receipt store passes because no adjacent pair exists.
//!   The bounds are accepted and ignored.
//! - [`ChainCheck::Signature`] checks what the generator actually writes:
//!   signature shape, the recomputable verify half, and the checksum shape,
//!   on every receipt whose ref tag falls inside the bounds.
//!
//! Read or parse errors make the whole validation fail; they are logged,
//! not returned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::model::CONTEXT_HASH_LEN;
use crate::services::receipts::{SIGNATURE_LEN, VERIFY_LEN, verify_half};
use crate::services::store::ReceiptStore;
use crate::utils::digest::is_hex_of_len;

const LEGACY_SIGNATURE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainCheck {
    #[default]
    Legacy,
    Signature,
}

pub struct ChainValidator {
    store: Arc<dyn ReceiptStore>,
    check: ChainCheck,
}

impl ChainValidator {
    pub fn new(store: Arc<dyn ReceiptStore>) -> Self {
        Self {
            store,
            check: ChainCheck::default(),
        }
    }

    pub fn with_check(mut self, check: ChainCheck) -> Self {
        self.check = check;
        self
    }

    pub fn check(&self) -> ChainCheck {
        self.check
    }

    /// Receipts considered for `[start_ref, end_ref]`. Legacy mode returns
    /// the whole store.
    pub fn context_chain(&self, start_ref: &str, end_ref: &str) -> Result<Vec<Value>, StoreError> {
        let all = self.store.list()?;
        Ok(match self.check {
            ChainCheck::Legacy => all,
            ChainCheck::Signature => all
                .into_iter()
                .filter(|r| within_bounds(ref_tag_of(r), start_ref, end_ref))
                .collect(),
        })
    }

    pub fn validate_context_chain(&self, start_ref: &str, end_ref: &str) -> bool {
        let receipts = match self.context_chain(start_ref, end_ref) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%start_ref, %end_ref, "error validating context chain: {e}");
                return false;
            }
        };

        let failed = match self.check {
            // Only the earlier receipt of each adjacent pair is checked.
            ChainCheck::Legacy => receipts
                .windows(2)
                .map(|pair| &pair[0])
                .find(|r| !verify_signature(r)),
            ChainCheck::Signature => receipts.iter().find(|r| !verify_receipt_signature(r)),
        };

        match failed {
            Some(r) => {
                tracing::warn!(ref_tag = %ref_tag_of(r), check = ?self.check, "invalid signature");
                false
            }
            None => true,
        }
    }
}

fn ref_tag_of(receipt: &Value) -> &str {
    receipt
        .get("ref_tag")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

fn within_bounds(tag: &str, start_ref: &str, end_ref: &str) -> bool {
    (start_ref.is_empty() || tag >= start_ref) && (end_ref.is_empty() || tag <= end_ref)
}

/// Historical shape check: `validation.signature` is a 16-char string.
pub fn verify_signature(receipt: &Value) -> bool {
    receipt
        .pointer("/validation/signature")
        .and_then(Value::as_str)
        .is_some_and(|s| s.chars().count() == LEGACY_SIGNATURE_LEN)
}

/// Check the fields the generator writes: `cryptographic_signature` is
/// `<32 hex>:<16 hex>` with the second half matching the ref tag, and
/// `checksum` is 8 hex.
pub fn verify_receipt_signature(receipt: &Value) -> bool {
    let Some(ref_tag) = receipt.get("ref_tag").and_then(Value::as_str) else {
        return false;
    };
    let Some(signature) = receipt
        .pointer("/validation/cryptographic_signature")
        .and_then(Value::as_str)
    else {
        return false;
    };
    let checksum_ok = receipt
        .pointer("/validation/checksum")
        .and_then(Value::as_str)
        .is_some_and(|c| is_hex_of_len(c, CONTEXT_HASH_LEN));

    match signature.split_once(':') {
        Some((sig, verify)) => {
            checksum_ok
                && is_hex_of_len(sig, SIGNATURE_LEN)
                && is_hex_of_len(verify, VERIFY_LEN)
                && verify_half(sig, ref_tag) == verify
        }
        None => false,
    }
}

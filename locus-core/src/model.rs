// src/model.rs
//! Context events and the receipt document.
//!
//! Snapshots and change sets are sorted maps, so two values with the same
//! keys and values are equal and serialize identically no matter how they
//! were built. The receipt structs mirror the on-disk JSON field for field;
//! auditors parse those names, so they are not renamed here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::digest::{canonical_json, sha256_prefix};

/// Hex length of [`ContextEvent::hash`].
pub const CONTEXT_HASH_LEN: usize = 8;

pub type Attributes = BTreeMap<String, Value>;

fn to_object(attrs: &Attributes) -> Value {
    Value::Object(
        attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Map<String, Value>>(),
    )
}

// ---------- snapshot ----------

/// Observed workspace state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSnapshot(Attributes);

impl ContextSnapshot {
    pub const WORKING_DIRECTORY: &'static str = "working_directory";
    pub const GIT_CHANGES: &'static str = "git_changes";
    pub const AGENTS: &'static str = "agents";
    pub const TIMESTAMP: &'static str = "timestamp";
    pub const PLATFORM: &'static str = "platform";
    pub const RUNTIME_VERSION: &'static str = "runtime_version";
    /// Present only on degraded snapshots.
    pub const ERROR: &'static str = "error";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.0
    }

    pub fn error(&self) -> Option<&str> {
        self.get(Self::ERROR).and_then(Value::as_str)
    }

    pub fn is_degraded(&self) -> bool {
        self.contains_key(Self::ERROR)
    }

    /// Shallow merge: every key of `changes` overwrites or extends `self`;
    /// keys absent from `changes` are kept as-is.
    pub fn merged(&self, changes: &ChangeSet) -> Self {
        let mut out = self.0.clone();
        for (k, v) in changes.iter() {
            out.insert(k.clone(), v.clone());
        }
        Self(out)
    }

    pub fn to_value(&self) -> Value {
        to_object(&self.0)
    }

    pub fn canonical_json(&self) -> String {
        canonical_json(&self.to_value())
    }

    /// First eight hex chars of SHA-256 over the canonical JSON.
    pub fn content_hash(&self) -> String {
        sha256_prefix(&self.canonical_json(), CONTEXT_HASH_LEN)
    }
}

impl From<Attributes> for ContextSnapshot {
    fn from(attrs: Attributes) -> Self {
        Self(attrs)
    }
}

impl FromIterator<(String, Value)> for ContextSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------- changes ----------

/// Caller-supplied mutations. Empty means a capture-only event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(Attributes);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Changed field names, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        to_object(&self.0)
    }
}

impl From<Attributes> for ChangeSet {
    fn from(attrs: Attributes) -> Self {
        Self(attrs)
    }
}

impl FromIterator<(String, Value)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------- event ----------

/// One captured state transition. Built once per capture and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEvent {
    pub ref_tag: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub trigger: String,
    pub context_before: ContextSnapshot,
    pub changes: ChangeSet,
    pub context_after: ContextSnapshot,
    pub hash: String,
    pub receipt_id: String,
}

impl ContextEvent {
    pub fn to_value(&self) -> Value {
        let mut m = Map::new();
        m.insert("ref_tag".into(), Value::from(self.ref_tag.clone()));
        m.insert("timestamp".into(), Value::from(self.timestamp));
        m.insert("trigger".into(), Value::from(self.trigger.clone()));
        m.insert("context_before".into(), self.context_before.to_value());
        m.insert("changes".into(), self.changes.to_value());
        m.insert("context_after".into(), self.context_after.to_value());
        m.insert("hash".into(), Value::from(self.hash.clone()));
        m.insert("receipt_id".into(), Value::from(self.receipt_id.clone()));
        Value::Object(m)
    }

    pub fn canonical_json(&self) -> String {
        canonical_json(&self.to_value())
    }

    /// True when the ref tag came from the capture fallback path.
    pub fn has_fallback_ref_tag(&self) -> bool {
        self.ref_tag.ends_with(crate::services::tracker::FALLBACK_MARKER)
    }
}

// ---------- receipt ----------

/// One-way provenance stamp over event identity and the wall clock at
/// generation time. It cannot be recomputed from the stored receipt, so it
/// is only ever compared for presence, never verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceStamp(String);

impl ProvenanceStamp {
    pub(crate) fn new(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub ref_tag: String,
    pub timestamp: i64,
    pub generation_context: GenerationContext,
    pub validation: Validation,
    pub security: SecurityProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub trigger: String,
    pub prior_state: ContextSnapshot,
    pub current_state: ContextSnapshot,
    pub delta_summary: DeltaSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub fields_changed: Vec<String>,
    pub new_capabilities: Value,
    pub risk_adjustments: Value,
}

impl DeltaSummary {
    /// `new_capabilities` and `risk_adjustments` come from the change set
    /// when present and truthy; null, false, `""` and zero read as absent.
    pub fn from_changes(changes: &ChangeSet) -> Self {
        Self {
            fields_changed: changes.keys(),
            new_capabilities: truthy(changes.get("new_capabilities"))
                .unwrap_or_else(|| Value::Array(Vec::new())),
            risk_adjustments: truthy(changes.get("risk_adjustments"))
                .unwrap_or_else(|| Value::from("none")),
        }
    }
}

fn truthy(v: Option<&Value>) -> Option<Value> {
    v.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    })
    .cloned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub checksum: String,
    pub cryptographic_signature: String,
    pub audit_fingerprint: ProvenanceStamp,
    pub timestamp: i64,
    pub signed_by: String,
    pub compliance: Compliance,
}

/// Declared retention and framework metadata. Declared only: nothing in
/// this crate enforces retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compliance {
    pub immutable: bool,
    pub audit_trail: bool,
    pub retention_years: u32,
    pub framework: Vec<String>,
}

impl Compliance {
    pub const RETENTION_YEARS: u32 = 7;
    pub const FRAMEWORKS: [&'static str; 3] = ["ISO_27001", "SOC_2", "NIST_CSF"];
}

impl Default for Compliance {
    fn default() -> Self {
        Self {
            immutable: true,
            audit_trail: true,
            retention_years: Self::RETENTION_YEARS,
            framework: Self::FRAMEWORKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// `non_repudiation` is carried for wire compatibility; the signature is a
/// truncated digest, not a public-key signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub signature_algorithm: String,
    pub verification_method: String,
    pub access_control: String,
    pub non_repudiation: bool,
}

impl Default for SecurityProfile {
    fn default() -> Self {
        Self {
            signature_algorithm: "SHA-256".into(),
            verification_method: "context_chain".into(),
            access_control: "role_based".into(),
            non_repudiation: true,
        }
    }
}

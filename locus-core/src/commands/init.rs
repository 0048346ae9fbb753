// locus-core/src/commands/init.rs

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;
use crate::utils::logbook::append_jsonl;

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Resolve the Locus root: explicit path, else LOCUS_ROOT, else `.locus`.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("LOCUS_ROOT").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(".locus"))
}

/// Lay out `root`. Existing entries are left alone, so this is safe to
/// call before every command.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut layout = Layout::new(root);
    layout.dir(".")?;
    layout.dir("receipts")?;
    layout.dir("logbook")?;
    layout.file(CONFIG_FILE, DEFAULT_CONFIG_TOML)?;

    let seed = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "event": "system_init",
        "agent": "system",
        "details": { "version": env!("CARGO_PKG_VERSION") },
    });
    layout.seeded_jsonl("logbook/actions.jsonl", &seed)?;

    Ok(layout.into_report())
}

/// Records what was created versus found while laying out a root.
struct Layout {
    root: PathBuf,
    created: Vec<String>,
    existed: Vec<String>,
}

impl Layout {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            created: Vec::new(),
            existed: Vec::new(),
        }
    }

    fn resolve(&self, rel: &str) -> PathBuf {
        if rel == "." {
            self.root.clone()
        } else {
            self.root.join(rel)
        }
    }

    fn note(&mut self, rel: &str, created: bool) {
        let list = if created { &mut self.created } else { &mut self.existed };
        list.push(rel.to_string());
    }

    fn dir(&mut self, rel: &str) -> Result<()> {
        let path = self.resolve(rel);
        let missing = !path.exists();
        if missing {
            fs::create_dir_all(&path)
                .with_context(|| format!("creating directory {}", path.display()))?;
        }
        self.note(rel, missing);
        Ok(())
    }

    fn file(&mut self, rel: &str, contents: &str) -> Result<()> {
        let path = self.resolve(rel);
        let missing = !path.exists();
        if missing {
            write_atomic(&path, contents.as_bytes())?;
        }
        self.note(rel, missing);
        Ok(())
    }

    /// Create a JSONL file holding `seed`, or add `seed` to an empty one.
    fn seeded_jsonl(&mut self, rel: &str, seed: &Value) -> Result<()> {
        let path = self.resolve(rel);
        let missing = !path.exists();
        let empty = missing
            || fs::metadata(&path)
                .with_context(|| format!("inspecting {}", path.display()))?
                .len()
                == 0;
        if empty {
            append_jsonl(&path, seed)?;
        }
        self.note(rel, missing);
        Ok(())
    }

    fn into_report(self) -> InitReport {
        InitReport {
            root: self.root,
            created: self.created,
            existed: self.existed,
        }
    }
}

/// Write through a sibling temp file and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[receipts]
path = "receipts"
# "legacy": CTX-<minute stamp>, collides within a minute
# "sequenced": legacy stamp + counter + random suffix
receipt_ids = "legacy"
signed_by = "locus_system"

[ref_tag]
# "native" builds tags in-process; "shell" runs the script below
source = "native"
script = "automation/scripts/generate_ref_tag.sh"
note = "Rust context capture"
timeout_ms = 5000

[snapshot]
workspace = ".."
agent_status = "context/AGENT_STATUS.json"

[chain]
# "legacy" keeps the historical validation.signature check
# "signature" verifies cryptographic_signature and checksum
check = "legacy"

[logbook]
actions = "logbook/actions.jsonl"

[services]
audit_enabled = true

[health]
agent_sync_baseline = 85
alert_threshold = 90
"#;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::services::chain::ChainCheck;
use crate::services::tracker::ReceiptIdScheme;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub receipts: ReceiptsConfig,
    #[serde(default)]
    pub ref_tag: RefTagConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub logbook: LogbookConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

impl CoreConfig {
    /// Read `<root>/config.toml` (defaults when absent) and resolve paths.
    pub fn load(root: &Path) -> Result<Self> {
        let file = root.join(CONFIG_FILE);
        let mut cfg = match fs::read_to_string(&file) {
            Ok(text) => {
                Self::from_toml(&text).with_context(|| format!("parsing {}", file.display()))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config = %file.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", file.display())),
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    /// Parse without touching paths; [`CoreConfig::load`] resolves them.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str::<CoreConfig>(text)?)
    }

    /// Relative paths: receipts, logbook and workspace against `root`; the
    /// agent status file and tag script against the workspace.
    pub fn resolve_paths(&mut self, root: &Path) {
        under(root, &mut self.receipts.path);
        under(root, &mut self.logbook.actions);
        under(root, &mut self.snapshot.workspace);
        let workspace = self.snapshot.workspace.clone();
        under(workspace.as_path(), &mut self.snapshot.agent_status);
        under(workspace.as_path(), &mut self.ref_tag.script);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptsConfig {
    #[serde(default = "ReceiptsConfig::default_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub receipt_ids: ReceiptIdScheme,
    #[serde(default = "ReceiptsConfig::default_signed_by")]
    pub signed_by: String,
}

impl ReceiptsConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("receipts")
    }

    fn default_signed_by() -> String {
        crate::services::receipts::SIGNED_BY.to_string()
    }
}

impl Default for ReceiptsConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            receipt_ids: ReceiptIdScheme::default(),
            signed_by: Self::default_signed_by(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefTagSourceKind {
    #[default]
    Native,
    Shell,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefTagConfig {
    #[serde(default)]
    pub source: RefTagSourceKind,
    #[serde(default = "RefTagConfig::default_script")]
    pub script: PathBuf,
    #[serde(default = "RefTagConfig::default_note")]
    pub note: String,
    #[serde(default = "RefTagConfig::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RefTagConfig {
    fn default_script() -> PathBuf {
        PathBuf::from("automation/scripts/generate_ref_tag.sh")
    }

    fn default_note() -> String {
        "Rust context capture".to_string()
    }

    fn default_timeout_ms() -> u64 {
        5_000
    }
}

impl Default for RefTagConfig {
    fn default() -> Self {
        Self {
            source: RefTagSourceKind::default(),
            script: Self::default_script(),
            note: Self::default_note(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "SnapshotConfig::default_workspace")]
    pub workspace: PathBuf,
    #[serde(default = "SnapshotConfig::default_agent_status")]
    pub agent_status: PathBuf,
}

impl SnapshotConfig {
    // The root normally sits inside the project checkout.
    fn default_workspace() -> PathBuf {
        PathBuf::from("..")
    }

    fn default_agent_status() -> PathBuf {
        PathBuf::from("context/AGENT_STATUS.json")
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            workspace: Self::default_workspace(),
            agent_status: Self::default_agent_status(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub check: ChainCheck,
}

/// Where the JSONL action log lives.
#[derive(Debug, Clone, Deserialize)]
pub struct LogbookConfig {
    #[serde(default = "LogbookConfig::default_actions")]
    pub actions: PathBuf,
}

impl LogbookConfig {
    fn default_actions() -> PathBuf {
        PathBuf::from("logbook/actions.jsonl")
    }
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            actions: Self::default_actions(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Turn the action logbook off entirely.
    #[serde(default = "enabled")]
    pub audit_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            audit_enabled: enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "HealthConfig::default_agent_sync_baseline")]
    pub agent_sync_baseline: u32,
    #[serde(default = "HealthConfig::default_alert_threshold")]
    pub alert_threshold: u32,
}

impl HealthConfig {
    fn default_agent_sync_baseline() -> u32 {
        85
    }

    fn default_alert_threshold() -> u32 {
        90
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            agent_sync_baseline: Self::default_agent_sync_baseline(),
            alert_threshold: Self::default_alert_threshold(),
        }
    }
}

fn under(base: &Path, p: &mut PathBuf) {
    if p.is_relative() {
        *p = base.join(&*p);
    }
}

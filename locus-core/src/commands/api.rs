// src/commands/api.rs
use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::commands::init::ensure_initialized;
use crate::config::{CoreConfig, RefTagSourceKind};
use crate::model::{ChangeSet, ContextEvent, Receipt};
use crate::services::{
    AuditLog, ChainValidator, ContextHealthMonitor, ContextTracker, FileReceiptStore,
    HealthReport, ReceiptGenerator, ReceiptStore,
};
use crate::sources::{
    Clock, NativeRefTagSource, RefTagSource, ShellRefTagSource, SystemClock,
    WorkspaceSnapshotSource,
};

/// Everything the CLI and other collaborators need, wired from one root.
pub struct Commands {
    root: PathBuf,
    config: CoreConfig,
    store: Arc<FileReceiptStore>,
    tracker: ContextTracker,
    validator: ChainValidator,
    health: ContextHealthMonitor,
    audit: AuditLog,
}

impl Commands {
    /// Initialize `root` if needed, load its config, and wire the services.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let report = ensure_initialized(root)
            .with_context(|| format!("initializing {}", root.display()))?;
        let config = CoreConfig::load(&report.root)?;
        Self::from_config(report.root, config, Arc::new(SystemClock))
    }

    /// Wire services from an already-resolved config.
    pub fn from_config(root: PathBuf, config: CoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = Arc::new(
            FileReceiptStore::open(&config.receipts.path)
                .with_context(|| format!("opening receipt store {}", config.receipts.path.display()))?,
        );
        let audit = AuditLog::new(&config.logbook.actions)
            .with_enabled(config.services.audit_enabled);

        let ref_tags: Box<dyn RefTagSource> = match config.ref_tag.source {
            RefTagSourceKind::Native => Box::new(NativeRefTagSource::new(clock.clone())),
            RefTagSourceKind::Shell => Box::new(
                ShellRefTagSource::script(&config.ref_tag.script, &config.snapshot.workspace)
                    .with_timeout(Duration::from_millis(config.ref_tag.timeout_ms)),
            ),
        };
        let snapshots = Box::new(WorkspaceSnapshotSource::new(
            &config.snapshot.workspace,
            &config.snapshot.agent_status,
            clock.clone(),
        ));

        let generator = ReceiptGenerator::new(store.clone(), clock.clone())
            .with_signed_by(config.receipts.signed_by.clone())
            .with_audit(audit.clone());
        let tracker = ContextTracker::new(ref_tags, snapshots, generator, clock)
            .with_receipt_ids(config.receipts.receipt_ids)
            .with_note(config.ref_tag.note.clone())
            .with_audit(audit.clone());
        let validator = ChainValidator::new(store.clone()).with_check(config.chain.check);
        let health = ContextHealthMonitor::new(store.clone(), audit.clone(), config.health.clone());

        tracing::debug!(root = %root.display(), "commands wired");
        Ok(Self {
            root,
            config,
            store,
            tracker,
            validator,
            health,
            audit,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn receipts_dir(&self) -> &Path {
        self.store.root()
    }

    pub fn receipt_path(&self, ref_tag: &str) -> PathBuf {
        self.store.path_for(ref_tag)
    }

    /// Capture one context event; the receipt is on disk when this returns `Ok`.
    pub fn capture(&self, action: &str, trigger: &str, changes: ChangeSet) -> Result<ContextEvent> {
        let event = self
            .tracker
            .capture(action, trigger, changes)
            .with_context(|| format!("capturing {action} event"))?;
        Ok(event)
    }

    /// Chain validation; never errors, failures read as `false`.
    pub fn validate_chain(&self, start_ref: &str, end_ref: &str) -> bool {
        let ok = self.validator.validate_context_chain(start_ref, end_ref);
        self.audit.record_action(
            "commands",
            "validate_chain",
            &json!({ "start_ref": start_ref, "end_ref": end_ref, "valid": ok }),
            if ok { "low" } else { "high" },
        );
        ok
    }

    /// Raw stored document for `ref_tag`.
    pub fn receipt(&self, ref_tag: &str) -> Result<Value> {
        Ok(self.store.read(ref_tag)?)
    }

    pub fn typed_receipt(&self, ref_tag: &str) -> Result<Receipt> {
        Ok(self.store.read_receipt(ref_tag)?)
    }

    pub fn health(&self) -> Result<HealthReport> {
        self.health.check_context_health()
    }
}

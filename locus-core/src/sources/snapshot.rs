// src/sources/snapshot.rs
//! Workspace snapshots.
//!
//! A snapshot source never fails: if it cannot observe the workspace it
//! returns a degraded snapshot carrying an `error` attribute, and capture
//! goes on with that.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::model::ContextSnapshot;
use crate::sources::clock::{Clock, rfc3339_millis};

pub trait SnapshotSource {
    fn snapshot(&self) -> ContextSnapshot;
}

/// Observes a project checkout: pending git changes, the agent status file,
/// and host facts.
pub struct WorkspaceSnapshotSource {
    workspace: PathBuf,
    agent_status: PathBuf,
    clock: Arc<dyn Clock>,
}

impl WorkspaceSnapshotSource {
    pub fn new(
        workspace: impl Into<PathBuf>,
        agent_status: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            agent_status: agent_status.into(),
            clock,
        }
    }

    fn try_snapshot(&self) -> Result<ContextSnapshot> {
        let out = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(&self.workspace)
            .output()
            .context("running git status")?;
        anyhow::ensure!(
            out.status.success(),
            "git status failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
        let git_changes = String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count();

        let agents = if self.agent_status.exists() {
            let text = fs::read_to_string(&self.agent_status)
                .with_context(|| format!("reading {}", self.agent_status.display()))?;
            serde_json::from_str::<Value>(&text)
                .with_context(|| format!("parsing {}", self.agent_status.display()))?
        } else {
            json!({})
        };

        Ok(ContextSnapshot::new()
            .with(ContextSnapshot::WORKING_DIRECTORY, self.workspace.display().to_string())
            .with(ContextSnapshot::GIT_CHANGES, git_changes)
            .with(ContextSnapshot::AGENTS, agents)
            .with(ContextSnapshot::TIMESTAMP, rfc3339_millis(self.clock.now()))
            .with(ContextSnapshot::RUNTIME_VERSION, env!("CARGO_PKG_VERSION"))
            .with(ContextSnapshot::PLATFORM, std::env::consts::OS))
    }

    fn degraded(&self, err: &anyhow::Error) -> ContextSnapshot {
        ContextSnapshot::new()
            .with(ContextSnapshot::WORKING_DIRECTORY, self.workspace.display().to_string())
            .with(ContextSnapshot::GIT_CHANGES, 0)
            .with(ContextSnapshot::AGENTS, json!({}))
            .with(ContextSnapshot::TIMESTAMP, rfc3339_millis(self.clock.now()))
            .with(ContextSnapshot::ERROR, format!("{err:#}"))
    }
}

impl SnapshotSource for WorkspaceSnapshotSource {
    fn snapshot(&self) -> ContextSnapshot {
        match self.try_snapshot() {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(workspace = %self.workspace.display(), "snapshot degraded: {e:#}");
                self.degraded(&e)
            }
        }
    }
}

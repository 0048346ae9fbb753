use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use locus_core::ChangeSet;
use locus_core::commands::{Commands, ensure_initialized, resolve_root};

#[derive(Parser)]
#[command(
    name = "locus",
    about = "Capture context events and audit their receipts"
)]
struct Cli {
    /// Locus root (defaults to $LOCUS_ROOT, then ./.locus)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the root layout and default config
    Init,
    /// Capture a context event and write its receipt
    Capture {
        /// Action type (notify, research, dash, ...)
        action: String,
        #[arg(long, default_value = "cli_invocation")]
        trigger: String,
        /// JSON object of changes to apply
        #[arg(long)]
        changes: Option<String>,
    },
    /// Validate the stored receipt chain
    Validate { start_ref: String, end_ref: String },
    /// Print a stored receipt
    Show { ref_tag: String },
    /// Print the context health report
    Health,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = resolve_root(cli.root.as_deref());
    tracing::debug!(root = %root.display(), "resolved locus root");
    match cli.cmd {
        Cmd::Init => init(&root),
        Cmd::Capture {
            action,
            trigger,
            changes,
        } => capture(&root, &action, &trigger, changes.as_deref()),
        Cmd::Validate { start_ref, end_ref } => validate(&root, &start_ref, &end_ref),
        Cmd::Show { ref_tag } => show(&root, &ref_tag),
        Cmd::Health => health(&root),
    }
}

fn init(root: &Path) -> Result<ExitCode> {
    let report = ensure_initialized(root)?;
    println!("initialized {}", report.root.display());
    for c in &report.created {
        println!("  created {c}");
    }
    for e in &report.existed {
        println!("  exists  {e}");
    }
    Ok(ExitCode::SUCCESS)
}

fn capture(root: &Path, action: &str, trigger: &str, changes: Option<&str>) -> Result<ExitCode> {
    let changes = match changes {
        Some(text) => serde_json::from_str::<ChangeSet>(text)
            .context("--changes must be a JSON object")?,
        None => ChangeSet::new().with("cli_executed", true),
    };

    let cmds = Commands::open(root)?;
    println!("=== LOCUS Context Capture ===");
    println!("Action: {action}");
    println!("Trigger: {trigger}");
    println!("=============================");

    let event = cmds.capture(action, trigger, changes)?;
    println!("Context Event Captured: {}", event.ref_tag);
    println!("Receipt ID: {}", event.receipt_id);
    println!("Context Hash: {}", event.hash);
    println!("Receipt: {}", cmds.receipt_path(&event.ref_tag).display());
    Ok(ExitCode::SUCCESS)
}

fn validate(root: &Path, start_ref: &str, end_ref: &str) -> Result<ExitCode> {
    let cmds = Commands::open(root)?;
    if cmds.validate_chain(start_ref, end_ref) {
        println!("chain valid");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("chain INVALID");
        Ok(ExitCode::from(1))
    }
}

fn show(root: &Path, ref_tag: &str) -> Result<ExitCode> {
    let cmds = Commands::open(root)?;
    let doc = cmds.receipt(ref_tag)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(ExitCode::SUCCESS)
}

fn health(root: &Path) -> Result<ExitCode> {
    let cmds = Commands::open(root)?;
    let report = cmds.health()?;
    println!("Overall Health: {:.1}%", report.overall_health);
    println!("Metrics:");
    let m = &report.metrics;
    println!("  context_integrity: {}%", m.context_integrity);
    println!("  agent_synchronization: {}%", m.agent_synchronization);
    println!("  schema_compliance: {}%", m.schema_compliance);
    println!("  audit_completeness: {}%", m.audit_completeness);
    println!("Receipts: {}  Audit entries: {}", report.receipt_count, report.audit_entries);
    if report.alerts.is_empty() {
        println!("No alerts");
    } else {
        println!("Alerts:");
        for a in &report.alerts {
            println!("  ! {a}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

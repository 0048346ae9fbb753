// src/sources/reftag.rs
//! Ref-tag sources: where each event's storage key comes from.
//!
//! - [`ShellRefTagSource`] runs the project's tag script with a hard timeout.
//! - [`NativeRefTagSource`] builds a tag in-process with a random suffix.
//!
//! Both only ever return tags that are safe file name components. Any
//! failure is reported as a [`SourceError`]; the tracker turns that into a
//! fallback tag instead of failing the capture.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::SourceError;
use crate::sources::clock::Clock;
use crate::utils::path::{is_safe_component, sanitize_token};

/// Produces a unique tag for an action. `note` is free text for the source's
/// own records.
pub trait RefTagSource {
    fn generate(&self, action: &str, note: &str) -> Result<String, SourceError>;
}

// ---------- shell ----------

/// Invokes `<program> [leading args..] <action> <note>` and reads one line
/// from stdout.
#[derive(Debug, Clone)]
pub struct ShellRefTagSource {
    program: PathBuf,
    leading_args: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
}

impl ShellRefTagSource {
    const POLL: Duration = Duration::from_millis(10);

    /// Run an executable script directly.
    pub fn script(script: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self::command(script, Vec::<String>::new(), workdir)
    }

    /// Run an arbitrary program with fixed leading arguments (e.g. `sh -c <body>`).
    pub fn command<I, S>(program: impl Into<PathBuf>, leading_args: I, workdir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
            workdir: workdir.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl RefTagSource for ShellRefTagSource {
    fn generate(&self, action: &str, note: &str) -> Result<String, SourceError> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(action)
            .arg(note)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Both pipes drain on their own threads so a chatty or forked script
        // cannot hold the caller past the deadline.
        let deadline = Instant::now() + self.timeout;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SourceError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(Self::POLL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(SourceError::Spawn { program, source });
                }
            }
        };

        if !status.success() {
            let stderr = collect(&stderr, deadline).unwrap_or_default();
            return Err(SourceError::Exit {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        // A background process that inherited stdout keeps it open past exit.
        let stdout = collect(&stdout, deadline).ok_or(SourceError::Timeout(self.timeout))?;
        let tag = stdout.lines().next().unwrap_or("").trim().to_string();
        if tag.is_empty() {
            return Err(SourceError::Empty);
        }
        if !is_safe_component(&tag) {
            return Err(SourceError::Unsafe(tag));
        }
        Ok(tag)
    }
}

/// Read `pipe` to EOF on a detached thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// Output of a [`drain`] thread, or `None` once `deadline` passes.
fn collect(rx: &Receiver<String>, deadline: Instant) -> Option<String> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(out) => Some(out),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

// ---------- native ----------

/// `LOCUS-<ACTION>-<yyyymmddHHMMSS>-<8 hex>`: readable prefix, random suffix.
pub struct NativeRefTagSource {
    clock: Arc<dyn Clock>,
}

impl NativeRefTagSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl RefTagSource for NativeRefTagSource {
    fn generate(&self, action: &str, _note: &str) -> Result<String, SourceError> {
        let action = sanitize_token(&action.to_uppercase());
        let stamp = self.clock.now().format("%Y%m%d%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("LOCUS-{action}-{stamp}-{}", &suffix[..8]))
    }
}

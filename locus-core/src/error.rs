// src/error.rs
//! Typed failures for the capture path. Command-level code wraps these in
//! `anyhow` with context; the core keeps them distinct so callers can tell a
//! missing receipt from a broken disk.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no receipt stored for ref tag {0}")]
    NotFound(String),
    #[error("ref tag {0:?} is not usable as a file name component")]
    InvalidRefTag(String),
    #[error("receipt store i/o failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("receipt {name} is not valid JSON: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{0} must not be empty")]
    InvalidInput(&'static str),
    #[error("receipt persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// Why a ref-tag source did not produce a tag. Never surfaced by capture,
/// which falls back to a synthesized tag instead.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ref tag source exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("ref tag source did not finish within {0:?}")]
    Timeout(Duration),
    #[error("ref tag source produced no output")]
    Empty,
    #[error("ref tag {0:?} is not usable as a file name component")]
    Unsafe(String),
}

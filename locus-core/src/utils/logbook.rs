// src/utils/logbook.rs
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::{
    fs,
    io::{BufRead, BufReader, Write},
    path::Path,
};

/// Append one JSON value as a line, creating parent directories as needed.
pub fn append_jsonl<S: Serialize>(path: &Path, val: &S) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(val)?;
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{}", json)?;
    Ok(())
}

/// Lines of a JSONL file whose `event` field equals `event`. A missing
/// file has zero; lines that are not JSON objects are skipped.
pub fn count_events(path: &Path, event: &str) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let f = fs::File::open(path)?;
    let mut n = 0;
    for line in BufReader::new(f).lines() {
        let line = line?;
        let matches = serde_json::from_str::<Value>(&line)
            .ok()
            .and_then(|v| v.get("event").and_then(Value::as_str).map(|e| e == event))
            .unwrap_or(false);
        if matches {
            n += 1;
        }
    }
    Ok(n)
}

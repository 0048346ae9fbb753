// src/services/store.rs
//! Receipt Store: one JSON document per ref tag.
//!
//! - [`FileReceiptStore`] writes `<root>/receipt_<ref_tag>.json`.
//! - [`MemoryReceiptStore`] keeps the same keys and ordering in memory.
//!
//! Writes overwrite in place. There is no locking and no temp-file rename,
//! so a crash mid-write can leave a truncated file behind; the chain
//! validator reports such a store as invalid. One writer process is assumed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::StoreError;
use crate::model::Receipt;
use crate::utils::path::{is_safe_component, receipt_file_name, ref_tag_from_file_name};

pub trait ReceiptStore {
    /// Create or overwrite the receipt for `ref_tag`.
    fn write(&self, ref_tag: &str, document: &Value) -> Result<(), StoreError>;

    /// The document last written for `ref_tag`.
    fn read(&self, ref_tag: &str) -> Result<Value, StoreError>;

    /// Every stored receipt, ordered by file name.
    fn list(&self) -> Result<Vec<Value>, StoreError>;

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list()?.len())
    }

    /// Typed read; fails with `Json` when the stored document is not a receipt.
    fn read_receipt(&self, ref_tag: &str) -> Result<Receipt, StoreError> {
        let doc = self.read(ref_tag)?;
        serde_json::from_value(doc).map_err(|source| StoreError::Json {
            name: receipt_file_name(ref_tag),
            source,
        })
    }
}

fn check_ref_tag(ref_tag: &str) -> Result<(), StoreError> {
    if is_safe_component(ref_tag) {
        Ok(())
    } else {
        Err(StoreError::InvalidRefTag(ref_tag.to_string()))
    }
}

// ---------- filesystem ----------

#[derive(Debug, Clone)]
pub struct FileReceiptStore {
    root: PathBuf,
}

impl FileReceiptStore {
    /// Open (and create if missing) the receipt directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, ref_tag: &str) -> PathBuf {
        self.root.join(receipt_file_name(ref_tag))
    }

    /// Receipt files in the directory, sorted by name.
    fn receipt_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.root.clone(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && ref_tag_from_file_name(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    fn load(path: &Path) -> Result<Value, StoreError> {
        let bytes = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source,
        })
    }
}

impl ReceiptStore for FileReceiptStore {
    fn write(&self, ref_tag: &str, document: &Value) -> Result<(), StoreError> {
        check_ref_tag(ref_tag)?;
        let path = self.path_for(ref_tag);
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Json {
            name: receipt_file_name(ref_tag),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| StoreError::Io { path, source })
    }

    fn read(&self, ref_tag: &str) -> Result<Value, StoreError> {
        check_ref_tag(ref_tag)?;
        let path = self.path_for(ref_tag);
        if !path.exists() {
            return Err(StoreError::NotFound(ref_tag.to_string()));
        }
        Self::load(&path)
    }

    fn list(&self) -> Result<Vec<Value>, StoreError> {
        self.receipt_paths()?
            .iter()
            .map(|p| Self::load(p))
            .collect()
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.receipt_paths()?.len())
    }
}

// ---------- memory ----------

/// In-process store keyed by the same file names the filesystem store uses,
/// so listing order matches.
#[derive(Debug, Default)]
pub struct MemoryReceiptStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn docs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn write(&self, ref_tag: &str, document: &Value) -> Result<(), StoreError> {
        check_ref_tag(ref_tag)?;
        self.docs().insert(receipt_file_name(ref_tag), document.clone());
        Ok(())
    }

    fn read(&self, ref_tag: &str) -> Result<Value, StoreError> {
        check_ref_tag(ref_tag)?;
        self.docs()
            .get(&receipt_file_name(ref_tag))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(ref_tag.to_string()))
    }

    fn list(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self.docs().values().cloned().collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.docs().len())
    }
}

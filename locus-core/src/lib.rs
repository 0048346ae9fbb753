//! Locus-Core: context event capture with tamper-evident receipts.
//!
//! ```text
//! capture(action, trigger, changes)
//!   → RefTagSource + SnapshotSource
//!   → ContextEvent { before, changes, after, hash }
//!   → ReceiptGenerator → ReceiptStore (one file per ref tag)
//! validate_chain(start, end) → ChainValidator over ReceiptStore::list()
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod sources;
pub mod utils;

pub use commands::Commands;
pub use error::{CaptureError, SourceError, StoreError};
pub use model::{ChangeSet, ContextEvent, ContextSnapshot, ProvenanceStamp, Receipt};

// src/services/mod.rs

pub mod audit;     // JSONL action logbook
pub mod chain;     // chain validation over the store
pub mod health;    // receipt/logbook health score
pub mod receipts;  // tamper-evidence fields + receipt document
pub mod store;     // the ONLY place receipts touch disk
pub mod tracker;   // capture orchestration

// Public API
pub use audit::AuditLog;
pub use chain::{ChainCheck, ChainValidator};
pub use health::{ContextHealthMonitor, HealthReport};
pub use receipts::ReceiptGenerator;
pub use store::{FileReceiptStore, MemoryReceiptStore, ReceiptStore};
pub use tracker::{ContextTracker, ReceiptIdScheme};

// src/commands/mod.rs
pub mod init;
mod api;


pub use api::Commands;

pub use init::{InitReport, ensure_initialized, resolve_root};

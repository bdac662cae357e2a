//! # Archive Ledger
//!
//! Durable, crash-safe record of which catalog items have been archived.
//!
//! ## Overview
//!
//! The ledger is the single source of truth for idempotency:
//! - an item is "done" if and only if it has a row in `archived_items`
//! - inserts are insert-if-absent, so recording the same id twice is a no-op
//! - every read and write goes through one mutex per physical store
//!
//! Nothing outside this crate writes to the table.

pub mod db;
pub mod error;
pub mod ledger;
pub mod models;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LedgerError, Result};
pub use ledger::{ArchiveLedger, SqliteArchiveLedger};
pub use models::ArchiveRecord;

//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the channel archiver:
//! - Configuration loading, building and validation
//! - Logging and tracing setup, including rotating log files
//! - Event bus for pipeline lifecycle notifications
//!
//! ## Overview
//!
//! Every other crate logs through `tracing` and reports progress through the
//! [`EventBus`](events::EventBus); this crate decides where those end up.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ArchiverConfig, Quality};
pub use error::{Error, Result};
pub use events::{ArchiveEvent, EventBus};

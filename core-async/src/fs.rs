//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! This re-exports Tokio's `fs` module so downstream crates can rely on the
//! familiar surface area without depending on Tokio directly.

pub use tokio::fs::{
    create_dir_all, metadata, read_dir, read_to_string, remove_file, rename, write, DirEntry,
    File, OpenOptions, ReadDir,
};

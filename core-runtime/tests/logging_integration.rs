//! Integration tests for logging system
//!
//! The global subscriber can be installed once per process, so everything
//! that needs a live subscriber lives in a single test.

use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_file_logging_and_single_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let guard = init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level("info")
            .with_file(log_dir.join("archiver.log")),
    )
    .unwrap();

    // Targets outside the archiver crates log at `warn` and above.
    tracing::warn!(item_id = "abc123", "integration marker event");
    tracing::debug!("filtered out");

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));

    drop(guard);

    let mut contents = String::new();
    for entry in std::fs::read_dir(&log_dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("archiver"), "unexpected file {}", name);
        assert!(name.ends_with(".log"), "unexpected file {}", name);
        contents.push_str(&std::fs::read_to_string(&path).unwrap());
    }

    assert!(contents.contains("integration marker event"));
    assert!(contents.contains("abc123"));
    assert!(!contents.contains("filtered out"));
}

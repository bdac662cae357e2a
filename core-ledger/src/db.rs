//! # Database Connection Pool Module
//!
//! SQLite pool setup for the ledger.
//!
//! ## Features
//!
//! - **WAL Mode**: readers never block the single writer
//! - **Automatic Migrations**: `migrations/` is embedded and applied on open
//! - **Health Checks**: `SELECT 1` before the pool is handed out
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_ledger::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("archive.db")).await?;
//! ```
//!
//! Tests use [`create_test_pool`], an in-memory database with the schema
//! already applied.

use crate::{LedgerError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database configuration for SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,

    /// File backing the database, `None` for in-memory
    pub path: Option<PathBuf>,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    /// How long SQLite waits on a locked database before failing
    pub busy_timeout: Duration,

    /// Maximum idle time for a connection before being closed
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            path: Some(path),
            min_connections: 1,
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Create a configuration for an in-memory database (useful for testing)
    ///
    /// An in-memory database lives only as long as its connections, so the
    /// pool is pinned to exactly one connection that is never reaped.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            path: None,
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the SQLite busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool
///
/// This function:
/// 1. Creates the parent directory of a file-backed database
/// 2. Configures SQLite connection options (WAL mode, synchronous NORMAL)
/// 3. Creates the pool and runs the embedded migrations
/// 4. Performs a health check
///
/// # Errors
///
/// Returns an error if:
/// - The database file or its directory cannot be created
/// - Connection pool creation fails
/// - Migrations fail
/// - Health check fails
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening ledger database"
    );

    if let Some(parent) = config.path.as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            core_async::fs::create_dir_all(parent).await?;
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(LedgerError::Database)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(config.busy_timeout)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            LedgerError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    info!(connections = pool.size(), "Ledger database ready");
    Ok(pool)
}

/// In-memory pool with migrations applied.
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    debug!("Running ledger migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LedgerError::Migration(e.to_string())
        })?;

    Ok(())
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        LedgerError::Database(e)
    })?;

    Ok(())
}

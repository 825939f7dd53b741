//! Storage Bootstrap Port
//!
//! Prepares persistent storage before the application accepts requests.

/// Schema and data-shape preparation for the read-model stores.
pub trait StorageBootstrap: Send + Sync {
    /// Create the storage schema if it does not exist yet.
    fn initialize_schema(&self) -> Result<(), StorageError>;

    /// Apply data-shape migrations that have not run yet.
    /// Returns the number of migrations applied.
    fn apply_pending_migrations(&self) -> Result<usize, StorageError>;
}

/// Storage preparation failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("connection for {database} is not configured: {reason}")]
    Connection { database: String, reason: String },
    #[error("schema setup failed for {database}: {source}")]
    Schema {
        database: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("migration {version} failed for {database}: {source}")]
    Migration {
        database: String,
        version: u32,
        #[source]
        source: rusqlite::Error,
    },
}

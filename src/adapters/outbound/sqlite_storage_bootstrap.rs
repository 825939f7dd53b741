//! SQLite Storage Bootstrap
//!
//! Creates the read-model schema and applies pending data-shape migrations
//! before the application starts serving.

use crate::adapters::outbound::db_context::resolve_connection_string;
use crate::domain::ports::{SettingsSource, StorageBootstrap, StorageError};
use rusqlite::{params, Connection};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A versioned, ordered schema change.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

const REGISTRATION_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conferences (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        location TEXT NOT NULL DEFAULT '',
        tagline TEXT NOT NULL DEFAULT '',
        twitter_search TEXT NOT NULL DEFAULT '',
        start_date TEXT NOT NULL DEFAULT '',
        is_published INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS seat_types (
        id TEXT PRIMARY KEY,
        conference_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price REAL NOT NULL,
        available_quantity INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS priced_orders (
        order_id TEXT PRIMARY KEY,
        order_version INTEGER NOT NULL DEFAULT 0,
        total REAL NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS priced_order_lines (
        order_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        description TEXT NOT NULL,
        unit_price REAL NOT NULL,
        quantity INTEGER NOT NULL,
        line_total REAL NOT NULL,
        PRIMARY KEY (order_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS order_access (
        order_id TEXT PRIMARY KEY,
        registrant_email TEXT NOT NULL,
        access_code TEXT NOT NULL
    )",
];

const PAYMENTS_SCHEMA: &[&str] = &["CREATE TABLE IF NOT EXISTS third_party_processor_payments (
        id TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        payment_source_id TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        total_amount REAL NOT NULL
    )"];

/// Migrations of the registration read models.
pub const REGISTRATION_MIGRATIONS: &[Migration] = &[Migration {
    version: 3,
    description: "priced orders carry reservation expiration and free-of-charge flag",
    statements: &[
        "ALTER TABLE priced_orders ADD COLUMN reservation_expiration TEXT",
        "ALTER TABLE priced_orders ADD COLUMN is_free_of_charge INTEGER NOT NULL DEFAULT 0",
    ],
}];

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS __schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at INTEGER NOT NULL
)";

/// One logical database managed by the bootstrap.
struct ManagedDatabase {
    name: String,
    schema: &'static [&'static str],
    migrations: &'static [Migration],
}

/// Storage bootstrap for the SQLite read-model databases.
pub struct SqliteStorageBootstrap {
    settings: Arc<dyn SettingsSource>,
    databases: Vec<ManagedDatabase>,
}

impl SqliteStorageBootstrap {
    /// Bootstrap the registration and payments databases under the given
    /// logical names.
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        registration_db: impl Into<String>,
        payments_db: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            databases: vec![
                ManagedDatabase {
                    name: registration_db.into(),
                    schema: REGISTRATION_SCHEMA,
                    migrations: REGISTRATION_MIGRATIONS,
                },
                ManagedDatabase {
                    name: payments_db.into(),
                    schema: PAYMENTS_SCHEMA,
                    migrations: &[],
                },
            ],
        }
    }

    fn open(&self, database: &str) -> Result<Connection, StorageError> {
        let path = resolve_connection_string(self.settings.as_ref(), database).map_err(|e| {
            StorageError::Connection {
                database: database.to_string(),
                reason: e.to_string(),
            }
        })?;
        Connection::open(&path).map_err(|e| StorageError::Connection {
            database: database.to_string(),
            reason: e.to_string(),
        })
    }

    /// Versions already applied to a database.
    pub fn applied_versions(&self, database: &str) -> Result<Vec<u32>, StorageError> {
        let conn = self.open(database)?;
        let schema_err = |source| StorageError::Schema {
            database: database.to_string(),
            source,
        };
        conn.execute(MIGRATIONS_TABLE, []).map_err(schema_err)?;

        let mut stmt = conn
            .prepare("SELECT version FROM __schema_migrations ORDER BY version")
            .map_err(schema_err)?;
        let versions = stmt
            .query_map([], |row| row.get::<_, u32>(0))
            .map_err(schema_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(schema_err)?;
        Ok(versions)
    }

    fn migrate(&self, db: &ManagedDatabase) -> Result<usize, StorageError> {
        let applied = self.applied_versions(&db.name)?;
        let mut conn = self.open(&db.name)?;
        let mut count = 0;

        for migration in db.migrations.iter().filter(|m| !applied.contains(&m.version)) {
            let migration_err = |source| StorageError::Migration {
                database: db.name.clone(),
                version: migration.version,
                source,
            };

            let tx = conn.transaction().map_err(migration_err)?;
            for statement in migration.statements {
                tx.execute(statement, []).map_err(migration_err)?;
            }
            tx.execute(
                "INSERT INTO __schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.description, unix_now()],
            )
            .map_err(migration_err)?;
            tx.commit().map_err(migration_err)?;

            tracing::info!(
                database = %db.name,
                version = migration.version,
                "applied migration: {}",
                migration.description
            );
            count += 1;
        }

        Ok(count)
    }
}

impl StorageBootstrap for SqliteStorageBootstrap {
    fn initialize_schema(&self) -> Result<(), StorageError> {
        for db in &self.databases {
            let conn = self.open(&db.name)?;
            for statement in db.schema.iter().chain(std::iter::once(&MIGRATIONS_TABLE)) {
                conn.execute(statement, []).map_err(|source| StorageError::Schema {
                    database: db.name.clone(),
                    source,
                })?;
            }
            tracing::debug!(database = %db.name, "schema initialized");
        }
        Ok(())
    }

    fn apply_pending_migrations(&self) -> Result<usize, StorageError> {
        let mut total = 0;
        for db in &self.databases {
            total += self.migrate(db)?;
        }
        Ok(total)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

//! Data Context Factories
//!
//! Named database-context constructors. Each factory is bound to a logical
//! database name; the real connection string is looked up in the settings
//! every time a context is opened.

use crate::domain::ports::{DataAccessError, SettingsError, SettingsSource};
use rusqlite::Connection;
use std::marker::PhantomData;
use std::sync::Arc;

/// Prefix of the settings holding connection strings.
pub const CONNECTION_STRING_PREFIX: &str = "ConnectionStrings:";

/// Logical database served by a context factory.
pub trait LogicalDatabase: Send + Sync + 'static {
    /// Default logical name, used when no name argument is registered.
    const DEFAULT_NAME: &'static str;
}

/// Conference registration read models (conferences, seats, orders).
pub enum ConferenceRegistration {}

impl LogicalDatabase for ConferenceRegistration {
    const DEFAULT_NAME: &'static str = "ConferenceRegistration";
}

/// Payments read models.
pub enum Payments {}

impl LogicalDatabase for Payments {
    const DEFAULT_NAME: &'static str = "Payments";
}

/// Name of the setting holding the connection string of `name`.
pub fn connection_setting_name(name: &str) -> String {
    format!("{}{}", CONNECTION_STRING_PREFIX, name)
}

/// Resolve the connection string of a logical database.
pub fn resolve_connection_string(
    settings: &dyn SettingsSource,
    name: &str,
) -> Result<String, SettingsError> {
    let setting = connection_setting_name(name);
    match settings.get_setting(&setting)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SettingsError::Missing(setting)),
    }
}

/// An open data context: one database connection.
pub struct DbContext {
    name: String,
    conn: Connection,
}

impl DbContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Factory of data contexts for the logical database `D`.
pub struct DbContextFactory<D: LogicalDatabase> {
    name: String,
    settings: Arc<dyn SettingsSource>,
    _database: PhantomData<fn() -> D>,
}

impl<D: LogicalDatabase> DbContextFactory<D> {
    pub fn new(name: impl Into<String>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            name: name.into(),
            settings,
            _database: PhantomData,
        }
    }

    /// Logical name this factory is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fail fast if the connection string is not configured.
    pub fn validate(&self) -> Result<(), SettingsError> {
        resolve_connection_string(self.settings.as_ref(), &self.name).map(|_| ())
    }

    /// Open a fresh context.
    pub fn open(&self) -> Result<DbContext, DataAccessError> {
        let path = resolve_connection_string(self.settings.as_ref(), &self.name).map_err(
            |source| DataAccessError::Context {
                context: self.name.clone(),
                source,
            },
        )?;
        let conn = Connection::open(&path)?;
        Ok(DbContext {
            name: self.name.clone(),
            conn,
        })
    }
}

impl<D: LogicalDatabase> Clone for DbContextFactory<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            settings: self.settings.clone(),
            _database: PhantomData,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::SettingsEnvironment;
    use tempfile::TempDir;

    #[test]
    fn test_connection_setting_name() {
        assert_eq!(connection_setting_name("Payments"), "ConnectionStrings:Payments");
    }

    #[test]
    fn test_resolve_missing_connection_string() {
        let env = SettingsEnvironment::default();
        let result = resolve_connection_string(&env, "Payments");
        assert_eq!(
            result,
            Err(SettingsError::Missing("ConnectionStrings:Payments".to_string()))
        );
    }

    #[test]
    fn test_resolve_blank_connection_string() {
        let env = SettingsEnvironment::with_settings([("ConnectionStrings:Payments", "  ")]);
        assert!(resolve_connection_string(&env, "Payments").is_err());
    }

    #[test]
    fn test_open_creates_fresh_contexts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payments.db");
        let env = Arc::new(SettingsEnvironment::with_settings([(
            "ConnectionStrings:Payments".to_string(),
            path.to_string_lossy().to_string(),
        )]));

        let factory: DbContextFactory<Payments> = DbContextFactory::new(Payments::DEFAULT_NAME, env);
        assert!(factory.validate().is_ok());

        let first = factory.open().unwrap();
        first
            .connection()
            .execute("CREATE TABLE t (id INTEGER)", [])
            .unwrap();
        let second = factory.open().unwrap();
        let count: i64 = second
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(second.name(), "Payments");
    }

    #[test]
    fn test_open_without_connection_string() {
        let env = Arc::new(SettingsEnvironment::default());
        let factory: DbContextFactory<ConferenceRegistration> =
            DbContextFactory::new("ConferenceRegistration", env);

        let result = factory.open();
        assert!(matches!(result, Err(DataAccessError::Context { .. })));
        assert!(factory.validate().is_err());
    }
}

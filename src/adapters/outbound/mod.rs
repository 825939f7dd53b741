pub mod db_context;

mod caching_conference_dao;
mod settings_environment;
mod sqlite_read_models;
mod sqlite_storage_bootstrap;

pub use caching_conference_dao::CachingConferenceDao;
pub use db_context::{ConferenceRegistration, DbContext, DbContextFactory, LogicalDatabase, Payments};
pub use settings_environment::{SettingsEnvironment, SettingsFileError};
pub use sqlite_read_models::{SqliteConferenceDao, SqliteOrderDao, SqlitePaymentDao};
pub use sqlite_storage_bootstrap::{Migration, SqliteStorageBootstrap, REGISTRATION_MIGRATIONS};

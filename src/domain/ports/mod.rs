mod disposable;
mod host_environment;
mod read_models;
mod settings_source;
mod storage_bootstrap;

pub use disposable::Disposable;
pub use host_environment::{ChangeListener, HostEnvironment, RecycleSignal};
pub use read_models::{ConferenceDao, DataAccessError, OrderDao, PaymentDao};
pub use settings_source::{SettingsError, SettingsSource};
pub use storage_bootstrap::{StorageBootstrap, StorageError};

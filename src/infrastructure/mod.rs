//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod change_watcher;
pub mod maintenance;
pub mod shared_cache;
pub mod shutdown;

pub use change_watcher::{classify, ChangeDecision, ConfigurationChangeWatcher};
pub use maintenance::{
    maintenance_guard, maintenance_response, MaintenanceModeGate, MAINTENANCE_MODE_SETTING_NAME,
    MAINTENANCE_RESPONSE_BODY,
};
pub use shared_cache::{CacheEntry, SharedCache};
pub use shutdown::{shutdown_signal, ShutdownController, RECYCLE_EXIT_CODE};

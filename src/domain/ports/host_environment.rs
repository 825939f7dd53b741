//! Host Environment Port
//!
//! The deployment environment the application runs in: it publishes
//! configuration change batches and accepts recycle requests.

use crate::domain::ports::SettingsSource;
use crate::domain::value_objects::ConfigurationChangeEvent;
use std::sync::Arc;

/// Receiver of environment change batches.
///
/// Batches are delivered one at a time from a single delivery task.
/// Implementations must not panic: a failure inside the delivery task
/// would stop every later notification.
pub trait ChangeListener: Send + Sync {
    fn on_environment_changed(&self, event: &ConfigurationChangeEvent);
}

/// Deployment environment hosting the application.
pub trait HostEnvironment: SettingsSource {
    /// Whether a managed host runtime is present at all.
    fn is_available(&self) -> bool;

    /// Register a listener for future change batches.
    fn subscribe(&self, listener: Arc<dyn ChangeListener>);

    /// Remove a listener previously passed to `subscribe`. Unknown
    /// listeners are ignored.
    fn unsubscribe(&self, listener: &Arc<dyn ChangeListener>);
}

/// Signal to the host supervisor asking for a full process restart.
///
/// Fire-and-forget: the caller does not wait and does not retry. The host
/// performs the orderly shutdown on its own schedule.
pub trait RecycleSignal: Send + Sync {
    fn request_recycle(&self);
}

//! Configuration Change Watcher
//!
//! Decides, per environment change batch, between recycling the process and
//! toggling maintenance mode in place.
//! Only the maintenance-mode flag can change without a restart; every other
//! setting may feed the object graph and takes effect in a fresh process.

use crate::domain::ports::{ChangeListener, RecycleSignal};
use crate::domain::value_objects::ConfigurationChangeEvent;
use crate::infrastructure::maintenance::MaintenanceModeGate;
use std::sync::Arc;

/// Outcome of classifying a change batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// At least one setting other than maintenance mode changed
    Recycle,
    /// Only the maintenance-mode setting changed
    RefreshMaintenanceMode,
    /// No configuration setting changes in the batch
    Ignore,
    /// Empty batch, or a setting change without a name; dropped as a whole
    Malformed,
}

impl std::fmt::Display for ChangeDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeDecision::Recycle => write!(f, "recycle"),
            ChangeDecision::RefreshMaintenanceMode => write!(f, "refresh-maintenance-mode"),
            ChangeDecision::Ignore => write!(f, "ignore"),
            ChangeDecision::Malformed => write!(f, "malformed"),
        }
    }
}

/// Classify a change batch.
///
/// A batch with no changes, or with a setting change whose name is empty,
/// is malformed and dropped as a whole.
pub fn classify(event: &ConfigurationChangeEvent, maintenance_setting: &str) -> ChangeDecision {
    if event.is_empty() || event.setting_names().any(|name| name.trim().is_empty()) {
        return ChangeDecision::Malformed;
    }

    let mut saw_maintenance = false;
    for name in event.setting_names() {
        if name != maintenance_setting {
            return ChangeDecision::Recycle;
        }
        saw_maintenance = true;
    }

    if saw_maintenance {
        ChangeDecision::RefreshMaintenanceMode
    } else {
        ChangeDecision::Ignore
    }
}

/// Listener reacting to environment configuration changes.
pub struct ConfigurationChangeWatcher {
    gate: Arc<MaintenanceModeGate>,
    recycle: Arc<dyn RecycleSignal>,
}

impl ConfigurationChangeWatcher {
    pub fn new(gate: Arc<MaintenanceModeGate>, recycle: Arc<dyn RecycleSignal>) -> Self {
        Self { gate, recycle }
    }

    /// Classify and act on one batch. Returns what was decided.
    pub fn handle(&self, event: &ConfigurationChangeEvent) -> ChangeDecision {
        let decision = classify(event, self.gate.setting_name());

        match decision {
            ChangeDecision::Recycle => {
                let names: Vec<&str> = event.setting_names().collect();
                tracing::warn!(?names, "configuration settings changed, requesting recycle");
                self.recycle.request_recycle();
            }
            ChangeDecision::RefreshMaintenanceMode => {
                let state = self.gate.refresh();
                tracing::info!("maintenance mode setting changed, now {}", state);
            }
            ChangeDecision::Ignore => {
                tracing::debug!(changes = event.len(), "no configuration setting changes in batch");
            }
            ChangeDecision::Malformed => {
                tracing::warn!(changes = event.len(), "ignoring malformed change batch");
            }
        }

        decision
    }
}

impl ChangeListener for ConfigurationChangeWatcher {
    fn on_environment_changed(&self, event: &ConfigurationChangeEvent) {
        self.handle(event);
    }
}

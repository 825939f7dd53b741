//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};

/// Lifetime policy of a registration in the container.
///
/// Governs whether a resolved instance is shared for the whole process
/// or freshly constructed on every resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    /// New instance per resolution, never cached
    Transient,
    /// One instance for the process, built once and shared by all callers
    Singleton,
}

impl Lifetime {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Singleton => "singleton",
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the application currently serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceState {
    /// Requests flow through to route dispatch
    Normal,
    /// Every request is answered with the fixed unavailable response
    Maintenance,
}

impl MaintenanceState {
    /// Interpret the raw value of the maintenance-mode setting.
    ///
    /// Anything that is not a boolean `true` (missing, empty, garbage)
    /// keeps the application serving.
    ///
    /// # Examples
    /// ```
    /// use conference_web::domain::value_objects::MaintenanceState;
    ///
    /// assert_eq!(MaintenanceState::from_setting(Some("True")), MaintenanceState::Maintenance);
    /// assert_eq!(MaintenanceState::from_setting(Some("yes")), MaintenanceState::Normal);
    /// assert_eq!(MaintenanceState::from_setting(None), MaintenanceState::Normal);
    /// ```
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "true" => Self::Maintenance,
            _ => Self::Normal,
        }
    }

    pub fn is_maintenance(&self) -> bool {
        matches!(self, Self::Maintenance)
    }
}

impl Default for MaintenanceState {
    fn default() -> Self {
        Self::Normal
    }
}

impl std::fmt::Display for MaintenanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A single change reported by the host environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentChange {
    /// An application configuration setting changed value
    ConfigurationSetting {
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
    /// Instances of a role were added or removed
    Topology { role: String },
}

impl EnvironmentChange {
    /// Convenience constructor for a setting change.
    pub fn setting(
        name: impl Into<String>,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Self {
        Self::ConfigurationSetting {
            name: name.into(),
            old_value: old_value.map(str::to_string),
            new_value: new_value.map(str::to_string),
        }
    }

    /// Name of the changed setting, if this is a setting change.
    pub fn setting_name(&self) -> Option<&str> {
        match self {
            Self::ConfigurationSetting { name, .. } => Some(name),
            Self::Topology { .. } => None,
        }
    }
}

/// One atomically delivered batch of environment changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationChangeEvent {
    pub changes: Vec<EnvironmentChange>,
}

impl ConfigurationChangeEvent {
    pub fn new(changes: Vec<EnvironmentChange>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Names of the changed configuration settings, in delivery order.
    /// Topology changes are skipped.
    pub fn setting_names(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().filter_map(EnvironmentChange::setting_name)
    }
}

//! Settings Source Port
//!
//! Read access to the current deployment configuration values.

/// Source of named configuration settings.
pub trait SettingsSource: Send + Sync {
    /// Current value of a setting, `None` when it is not defined.
    fn get_setting(&self, name: &str) -> Result<Option<String>, SettingsError>;
}

/// Errors raised while reading settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("configuration source unavailable: {0}")]
    Unavailable(String),
    #[error("required setting {0} is not defined")]
    Missing(String),
}

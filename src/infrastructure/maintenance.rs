//! Maintenance Mode Gate
//!
//! Process-wide switch that takes the site offline without a restart.
//! The state only changes through `refresh`, which is driven by startup
//! and by environment change notifications. There is no polling.

use crate::domain::ports::SettingsSource;
use crate::domain::value_objects::MaintenanceState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Well-known setting controlling maintenance mode.
pub const MAINTENANCE_MODE_SETTING_NAME: &str = "MaintenanceMode";

/// Body of the fixed response served while in maintenance.
pub const MAINTENANCE_RESPONSE_BODY: &str =
    "The site is temporarily unavailable for scheduled maintenance. Please try again shortly.";

/// Suggested client back-off, in seconds.
const RETRY_AFTER_SECS: &str = "300";

/// Maintenance mode gate.
///
/// The flag is a single atomic word: readers see either the old or the new
/// state, never a partial update.
pub struct MaintenanceModeGate {
    setting_name: String,
    in_maintenance: AtomicBool,
    settings: Arc<dyn SettingsSource>,
}

impl MaintenanceModeGate {
    /// Create a gate in `Normal` state. Call `refresh` to load the real value.
    pub fn new(setting_name: impl Into<String>, settings: Arc<dyn SettingsSource>) -> Self {
        Self {
            setting_name: setting_name.into(),
            in_maintenance: AtomicBool::new(false),
            settings,
        }
    }

    /// Name of the setting this gate follows.
    pub fn setting_name(&self) -> &str {
        &self.setting_name
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> MaintenanceState {
        if self.in_maintenance.load(Ordering::Acquire) {
            MaintenanceState::Maintenance
        } else {
            MaintenanceState::Normal
        }
    }

    pub fn is_in_maintenance(&self) -> bool {
        self.state().is_maintenance()
    }

    /// Re-read the setting and replace the state.
    ///
    /// If the settings source cannot be read, the last known state stays in
    /// force. Returns the state after the refresh.
    pub fn refresh(&self) -> MaintenanceState {
        let value = match self.settings.get_setting(&self.setting_name) {
            Ok(value) => value,
            Err(e) => {
                let current = self.state();
                tracing::warn!(
                    setting = %self.setting_name,
                    "maintenance mode refresh failed, staying in {} mode: {}",
                    current,
                    e
                );
                return current;
            }
        };

        let next = MaintenanceState::from_setting(value.as_deref());
        let was_maintenance = self
            .in_maintenance
            .swap(next.is_maintenance(), Ordering::AcqRel);

        if was_maintenance != next.is_maintenance() {
            tracing::info!(setting = %self.setting_name, "maintenance mode is now {}", next);
        } else {
            tracing::debug!(setting = %self.setting_name, "maintenance mode unchanged ({})", next);
        }

        next
    }
}

impl std::fmt::Debug for MaintenanceModeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceModeGate")
            .field("setting_name", &self.setting_name)
            .field("state", &self.state())
            .finish()
    }
}

/// Fixed response served to every request while in maintenance.
pub fn maintenance_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
        MAINTENANCE_RESPONSE_BODY,
    )
        .into_response()
}

/// Request hook: short-circuits all processing while in maintenance.
///
/// Installed with `axum::middleware::from_fn_with_state` around the whole
/// router, so route dispatch and data access are skipped entirely.
pub async fn maintenance_guard(
    State(gate): State<Arc<MaintenanceModeGate>>,
    req: Request,
    next: Next,
) -> Response {
    if gate.is_in_maintenance() {
        tracing::debug!(path = %req.uri().path(), "request rejected, in maintenance mode");
        return maintenance_response();
    }
    next.run(req).await
}

//! conference-web Library
//!
//! Web host of the conference registration read side: object-graph
//! composition, the shared read-model cache, maintenance mode and
//! configuration change handling. Exposed as a library for integration
//! tests.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{ApplicationLifecycle, CompositionRoot, Container, RunningApplication};
pub use config::{load_config, Config};
pub use domain::value_objects::{ConfigurationChangeEvent, Lifetime, MaintenanceState};
pub use infrastructure::{ConfigurationChangeWatcher, MaintenanceModeGate, SharedCache};

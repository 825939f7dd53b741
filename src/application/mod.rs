//! Application Layer
//!
//! Object-graph composition and the startup/stop sequence of the host.

pub mod composition;
pub mod container;
pub mod hooks;
pub mod lifecycle;

pub use composition::{CompositionRoot, READ_MODEL_CACHE_NAME};
pub use container::{CompositionError, ConstructionArgs, Container};
pub use hooks::DeploymentHooks;
pub use lifecycle::{ApplicationLifecycle, LifecycleError, RunningApplication};

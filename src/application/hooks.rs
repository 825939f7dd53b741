use crate::application::container::{CompositionError, Container};
use crate::config::Config;

/// Deployment-specific extension points.
///
/// A deployment may contribute extra registrations (or override default
/// ones) and run work at start and stop. Every hook has an empty default.
pub trait DeploymentHooks: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "deployment"
    }

    /// Called last while the object graph is being built.
    fn on_create_container(
        &self,
        _container: &mut Container,
        _config: &Config,
    ) -> Result<(), CompositionError> {
        Ok(())
    }

    fn on_start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

//! Composition Root
//!
//! Assembles the read-side object graph once at startup: data-context
//! factories, DAOs, the shared read-model cache and the caching decorator.
//! A failed build releases whatever singletons were already constructed.

use crate::adapters::outbound::{
    CachingConferenceDao, ConferenceRegistration, DbContextFactory, LogicalDatabase, Payments,
    SqliteConferenceDao, SqliteOrderDao, SqlitePaymentDao,
};
use crate::application::container::{CompositionError, ConstructionArgs, Container};
use crate::application::hooks::DeploymentHooks;
use crate::config::Config;
use crate::domain::ports::{ConferenceDao, OrderDao, PaymentDao, SettingsSource};
use crate::infrastructure::SharedCache;
use std::sync::Arc;
use std::time::Duration;

/// Name of the cache shared by all read-model decorators.
pub const READ_MODEL_CACHE_NAME: &str = "ReadModel";

pub struct CompositionRoot;

impl CompositionRoot {
    /// Build the container.
    ///
    /// On failure every singleton constructed so far is released in reverse
    /// order before the error is returned. There is no retry.
    pub fn build(
        config: &Config,
        settings: Arc<dyn SettingsSource>,
        hooks: &[Arc<dyn DeploymentHooks>],
    ) -> Result<Arc<Container>, CompositionError> {
        let mut container = Container::new();

        match Self::register_all(&mut container, config, settings, hooks) {
            Ok(()) => {
                tracing::info!(
                    registrations = container.len(),
                    singletons = container.pending_releases(),
                    "object graph built"
                );
                Ok(Arc::new(container))
            }
            Err(cause) => {
                tracing::error!(
                    constructed = container.pending_releases(),
                    "object graph construction failed: {}",
                    cause
                );
                match container.dispose() {
                    Ok(()) => Err(cause),
                    Err(CompositionError::Release { failures }) => Err(CompositionError::Aborted {
                        cause: Box::new(cause),
                        release_failures: failures,
                    }),
                    Err(other) => Err(CompositionError::Aborted {
                        cause: Box::new(cause),
                        release_failures: vec![other.to_string()],
                    }),
                }
            }
        }
    }

    fn register_all(
        container: &mut Container,
        config: &Config,
        settings: Arc<dyn SettingsSource>,
        hooks: &[Arc<dyn DeploymentHooks>],
    ) -> Result<(), CompositionError> {
        register_context_factory::<ConferenceRegistration>(
            container,
            &config.registration_db,
            settings.clone(),
        );
        register_context_factory::<Payments>(container, &config.payments_db, settings);

        container.register_transient::<SqliteConferenceDao, _>(ConstructionArgs::new(), |c, _| {
            let contexts = c.resolve::<DbContextFactory<ConferenceRegistration>>()?;
            Ok(Arc::new(SqliteConferenceDao::new((*contexts).clone())))
        });

        let cache = container.register_instance(Arc::new(SharedCache::new(
            READ_MODEL_CACHE_NAME,
            Duration::from_secs(config.cache_ttl_secs),
        )));

        let seat_types_ttl = Duration::from_secs(config.seat_types_ttl_secs);
        container.register_singleton::<dyn ConferenceDao, _>(|c| {
            let inner = c.resolve::<SqliteConferenceDao>()?;
            Ok(Arc::new(CachingConferenceDao::new(inner, cache, seat_types_ttl)) as Arc<dyn ConferenceDao>)
        })?;

        container.register_transient::<dyn OrderDao, _>(ConstructionArgs::new(), |c, _| {
            let contexts = c.resolve::<DbContextFactory<ConferenceRegistration>>()?;
            Ok(Arc::new(SqliteOrderDao::new((*contexts).clone())) as Arc<dyn OrderDao>)
        });

        container.register_transient::<dyn PaymentDao, _>(ConstructionArgs::new(), |c, _| {
            let contexts = c.resolve::<DbContextFactory<Payments>>()?;
            Ok(Arc::new(SqlitePaymentDao::new((*contexts).clone())) as Arc<dyn PaymentDao>)
        });

        for hook in hooks {
            tracing::debug!(hook = hook.name(), "running container hook");
            hook.on_create_container(container, config)?;
        }

        Ok(())
    }
}

/// Register the data-context factory of `D` under its logical `name`.
/// A blank name falls back to `D::DEFAULT_NAME`.
///
/// Resolution fails when the connection string is not configured.
fn register_context_factory<D: LogicalDatabase>(
    container: &mut Container,
    name: &str,
    settings: Arc<dyn SettingsSource>,
) {
    let args = match name.trim() {
        "" => ConstructionArgs::new(),
        name => ConstructionArgs::new().with("name", name),
    };
    container.register_transient::<DbContextFactory<D>, _>(
        args,
        move |_, args| {
            let name = args.get("name").unwrap_or(D::DEFAULT_NAME);
            let factory = DbContextFactory::<D>::new(name, settings.clone());
            factory
                .validate()
                .map_err(CompositionError::construction::<DbContextFactory<D>>)?;
            Ok(Arc::new(factory))
        },
    );
}

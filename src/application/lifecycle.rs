//! Application Lifecycle
//!
//! Startup sequence of the web host and its orderly stop. Any startup
//! failure is fatal: the caller is expected to exit.

use crate::adapters::inbound::http_server;
use crate::application::composition::CompositionRoot;
use crate::application::container::{CompositionError, Container};
use crate::application::hooks::DeploymentHooks;
use crate::config::Config;
use crate::domain::ports::{
    ChangeListener, HostEnvironment, RecycleSignal, SettingsSource, StorageBootstrap,
    StorageError,
};
use crate::infrastructure::{ConfigurationChangeWatcher, MaintenanceModeGate, SharedCache};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("storage bootstrap failed: {0}")]
    Storage(#[from] StorageError),
    #[error("composition failed: {0}")]
    Composition(#[from] CompositionError),
    #[error("deployment hook {hook} failed: {reason}")]
    Hook { hook: String, reason: String },
}

pub struct ApplicationLifecycle<E: HostEnvironment + 'static> {
    config: Config,
    environment: Arc<E>,
    bootstrap: Arc<dyn StorageBootstrap>,
    recycle: Arc<dyn RecycleSignal>,
    hooks: Vec<Arc<dyn DeploymentHooks>>,
}

impl<E: HostEnvironment + 'static> ApplicationLifecycle<E> {
    pub fn new(
        config: Config,
        environment: Arc<E>,
        bootstrap: Arc<dyn StorageBootstrap>,
        recycle: Arc<dyn RecycleSignal>,
        hooks: Vec<Arc<dyn DeploymentHooks>>,
    ) -> Self {
        Self {
            config,
            environment,
            bootstrap,
            recycle,
            hooks,
        }
    }

    /// Run the startup sequence.
    ///
    /// Storage is initialised and migrated before anything else. The change
    /// watcher is subscribed before the object graph is built so no batch
    /// published during startup is missed, and removed again if startup
    /// fails.
    pub async fn start(&self) -> Result<RunningApplication, LifecycleError> {
        tracing::info!("starting application");

        self.bootstrap.initialize_schema()?;
        let applied = self.bootstrap.apply_pending_migrations()?;
        tracing::info!(applied, "storage ready");

        let settings: Arc<dyn SettingsSource> = self.environment.clone();
        let gate = Arc::new(MaintenanceModeGate::new(
            self.config.maintenance_setting.clone(),
            settings.clone(),
        ));

        let environment: Arc<dyn HostEnvironment> = self.environment.clone();
        let watcher = if environment.is_available() {
            let watcher: Arc<dyn ChangeListener> = Arc::new(ConfigurationChangeWatcher::new(
                gate.clone(),
                self.recycle.clone(),
            ));
            environment.subscribe(watcher.clone());
            Some(watcher)
        } else {
            tracing::info!("no host environment, configuration changes will not be observed");
            None
        };

        let container = match CompositionRoot::build(&self.config, settings, &self.hooks) {
            Ok(container) => container,
            Err(e) => {
                unsubscribe_watcher(&environment, watcher.as_ref());
                return Err(e.into());
            }
        };

        match self.finish_start(&container, &gate) {
            Ok(router) => Ok(RunningApplication {
                container,
                gate,
                router,
                hooks: self.hooks.clone(),
                environment,
                watcher,
            }),
            Err(e) => {
                unsubscribe_watcher(&environment, watcher.as_ref());
                if let Err(release) = container.dispose() {
                    tracing::error!("failed to release components after startup failure: {}", release);
                }
                Err(e)
            }
        }
    }

    fn finish_start(
        &self,
        container: &Arc<Container>,
        gate: &Arc<MaintenanceModeGate>,
    ) -> Result<Router, LifecycleError> {
        container
            .resolve::<SharedCache>()?
            .start_gc(Duration::from_secs(self.config.cache_gc_interval_secs));

        let state = gate.refresh();
        let router = http_server::router(container.clone(), gate.clone());

        for hook in &self.hooks {
            hook.on_start().map_err(|e| LifecycleError::Hook {
                hook: hook.name().to_string(),
                reason: e.to_string(),
            })?;
        }

        tracing::info!(maintenance = %state, "application started");
        Ok(router)
    }
}

fn unsubscribe_watcher(
    environment: &Arc<dyn HostEnvironment>,
    watcher: Option<&Arc<dyn ChangeListener>>,
) {
    if let Some(watcher) = watcher {
        environment.unsubscribe(watcher);
        tracing::debug!("configuration change watcher unsubscribed");
    }
}

/// A started application.
pub struct RunningApplication {
    container: Arc<Container>,
    gate: Arc<MaintenanceModeGate>,
    router: Router,
    hooks: Vec<Arc<dyn DeploymentHooks>>,
    environment: Arc<dyn HostEnvironment>,
    watcher: Option<Arc<dyn ChangeListener>>,
}

impl RunningApplication {
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn gate(&self) -> &Arc<MaintenanceModeGate> {
        &self.gate
    }

    /// Request dispatch, maintenance guard included.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Stop observing configuration changes, run stop hooks, then release
    /// every singleton.
    ///
    /// Hook failures do not prevent the release; the first one is returned
    /// if the release itself succeeded.
    pub fn stop(self) -> Result<(), LifecycleError> {
        tracing::info!("stopping application");

        unsubscribe_watcher(&self.environment, self.watcher.as_ref());

        let mut hook_failure = None;
        for hook in &self.hooks {
            if let Err(e) = hook.on_stop() {
                tracing::error!(hook = hook.name(), "stop hook failed: {}", e);
                hook_failure.get_or_insert(LifecycleError::Hook {
                    hook: hook.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        self.container.dispose()?;
        tracing::info!("application stopped");

        match hook_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::{SettingsEnvironment, SqliteStorageBootstrap};
    use crate::domain::ports::Disposable;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRecycle {
        requests: AtomicUsize,
    }

    impl RecycleSignal for CountingRecycle {
        fn request_recycle(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Marker {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Disposable for Marker {
        fn dispose(&self) -> anyhow::Result<()> {
            self.log.lock().push("released".to_string());
            Ok(())
        }
    }

    /// Hooks recording every call.
    struct RecordingHooks {
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
    }

    /// Hooks whose registrations are rejected.
    struct RejectingHooks;

    impl DeploymentHooks for RejectingHooks {
        fn on_create_container(
            &self,
            _container: &mut Container,
            _config: &Config,
        ) -> Result<(), CompositionError> {
            Err(CompositionError::construction::<Marker>("rejected by deployment"))
        }
    }

    impl DeploymentHooks for RecordingHooks {
        fn name(&self) -> &str {
            "recording"
        }

        fn on_create_container(
            &self,
            container: &mut Container,
            _config: &Config,
        ) -> Result<(), CompositionError> {
            self.log.lock().push("create".to_string());
            container.register_instance(Arc::new(Marker { log: self.log.clone() }));
            Ok(())
        }

        fn on_start(&self) -> anyhow::Result<()> {
            self.log.lock().push("start".to_string());
            if self.fail_start {
                anyhow::bail!("worker pool refused to start");
            }
            Ok(())
        }

        fn on_stop(&self) -> anyhow::Result<()> {
            self.log.lock().push("stop".to_string());
            Ok(())
        }
    }

    fn environment(dir: &TempDir, maintenance: &str) -> Arc<SettingsEnvironment> {
        Arc::new(SettingsEnvironment::with_settings([
            (
                "ConnectionStrings:ConferenceRegistration".to_string(),
                dir.path().join("registration.db").to_string_lossy().to_string(),
            ),
            (
                "ConnectionStrings:Payments".to_string(),
                dir.path().join("payments.db").to_string_lossy().to_string(),
            ),
            ("MaintenanceMode".to_string(), maintenance.to_string()),
        ]))
    }

    fn lifecycle(
        env: Arc<SettingsEnvironment>,
        recycle: Arc<CountingRecycle>,
        hooks: Vec<Arc<dyn DeploymentHooks>>,
    ) -> ApplicationLifecycle<SettingsEnvironment> {
        let bootstrap = Arc::new(SqliteStorageBootstrap::new(
            env.clone(),
            "ConferenceRegistration",
            "Payments",
        ));
        ApplicationLifecycle::new(Config::default(), env, bootstrap, recycle, hooks)
    }

    #[tokio::test]
    async fn test_start_reads_initial_maintenance_state() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "true");

        let app = lifecycle(env.clone(), Arc::default(), vec![]).start().await.unwrap();

        assert!(app.gate().is_in_maintenance());
        assert_eq!(env.listener_count(), 1);
        app.stop().unwrap();
    }

    #[tokio::test]
    async fn test_start_without_host_environment_skips_watcher() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "false");
        env.set_available(false);

        let app = lifecycle(env.clone(), Arc::default(), vec![]).start().await.unwrap();

        assert!(!app.gate().is_in_maintenance());
        assert_eq!(env.listener_count(), 0);
        app.stop().unwrap();
    }

    #[tokio::test]
    async fn test_setting_changes_reach_gate_and_recycle() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "false");
        let recycle = Arc::new(CountingRecycle::default());

        let app = lifecycle(env.clone(), recycle.clone(), vec![]).start().await.unwrap();

        env.set("MaintenanceMode", "true");
        assert!(app.gate().is_in_maintenance());
        assert_eq!(recycle.requests.load(Ordering::SeqCst), 0);

        env.set("ConnectionStrings:Payments", "elsewhere.db");
        assert_eq!(recycle.requests.load(Ordering::SeqCst), 1);
        app.stop().unwrap();
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<Arc<dyn DeploymentHooks>> = vec![Arc::new(RecordingHooks {
            log: log.clone(),
            fail_start: false,
        })];

        let app = lifecycle(environment(&dir, "false"), Arc::default(), hooks)
            .start()
            .await
            .unwrap();
        app.stop().unwrap();

        assert_eq!(*log.lock(), vec!["create", "start", "stop", "released"]);
    }

    #[tokio::test]
    async fn test_failed_start_hook_releases_container() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<Arc<dyn DeploymentHooks>> = vec![Arc::new(RecordingHooks {
            log: log.clone(),
            fail_start: true,
        })];

        let result = lifecycle(environment(&dir, "false"), Arc::default(), hooks)
            .start()
            .await;

        assert!(matches!(result, Err(LifecycleError::Hook { .. })));
        assert_eq!(*log.lock(), vec!["create", "start", "released"]);
    }

    #[tokio::test]
    async fn test_failed_composition_unsubscribes_watcher() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "false");
        let recycle = Arc::new(CountingRecycle::default());
        let hooks: Vec<Arc<dyn DeploymentHooks>> = vec![Arc::new(RejectingHooks)];

        let result = lifecycle(env.clone(), recycle.clone(), hooks).start().await;

        assert!(matches!(result, Err(LifecycleError::Composition(_))));
        assert_eq!(env.listener_count(), 0);

        env.set("Other", "x");
        assert_eq!(recycle.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_start_hook_unsubscribes_watcher() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "false");
        let recycle = Arc::new(CountingRecycle::default());
        let hooks: Vec<Arc<dyn DeploymentHooks>> = vec![Arc::new(RecordingHooks {
            log: Arc::new(Mutex::new(Vec::new())),
            fail_start: true,
        })];

        let result = lifecycle(env.clone(), recycle.clone(), hooks).start().await;

        assert!(result.is_err());
        assert_eq!(env.listener_count(), 0);

        env.set("MaintenanceMode", "true");
        env.set("Other", "x");
        assert_eq!(recycle.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_unsubscribes_watcher() {
        let dir = TempDir::new().unwrap();
        let env = environment(&dir, "false");
        let recycle = Arc::new(CountingRecycle::default());

        let app = lifecycle(env.clone(), recycle.clone(), vec![]).start().await.unwrap();
        assert_eq!(env.listener_count(), 1);

        app.stop().unwrap();
        assert_eq!(env.listener_count(), 0);

        env.set("Other", "x");
        assert_eq!(recycle.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let env = Arc::new(SettingsEnvironment::default());

        let result = lifecycle(env, Arc::default(), vec![]).start().await;

        assert!(matches!(result, Err(LifecycleError::Storage(_))));
    }
}

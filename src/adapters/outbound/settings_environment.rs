//! Settings Environment
//!
//! In-process host environment: holds the deployment settings, optionally
//! reloads them from a JSON file, and publishes each change as one batch to
//! the subscribed listeners.

use crate::domain::ports::{ChangeListener, HostEnvironment, SettingsError, SettingsSource};
use crate::domain::value_objects::{ConfigurationChangeEvent, EnvironmentChange};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Settings file being watched and its last seen modification time.
#[derive(Debug, Clone)]
struct WatchedFile {
    path: PathBuf,
    modified: SystemTime,
}

/// Host environment backed by an in-memory settings map.
pub struct SettingsEnvironment {
    /// Current setting values
    values: RwLock<HashMap<String, String>>,
    /// Listeners receiving change batches
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    /// Held while a batch is being delivered so batches never interleave
    delivery: Mutex<()>,
    /// Optional settings file
    watched_file: RwLock<Option<WatchedFile>>,
    /// Whether a managed host runtime is present
    available: AtomicBool,
    /// Poll interval for the settings file
    poll_interval: Duration,
}

impl SettingsEnvironment {
    /// Create an empty environment.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            delivery: Mutex::new(()),
            watched_file: RwLock::new(None),
            available: AtomicBool::new(true),
            poll_interval,
        }
    }

    /// Create an environment seeded with settings, without notifications.
    pub fn with_settings<I, K, V>(settings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env = Self::default();
        {
            let mut values = env.values.write();
            for (k, v) in settings {
                values.insert(k.into(), v.into());
            }
        }
        env
    }

    /// Load settings from a JSON object file and watch it for changes.
    pub fn from_file(
        path: impl AsRef<Path>,
        poll_interval: Duration,
    ) -> Result<Self, SettingsFileError> {
        let env = Self::new(poll_interval);
        let path = path.as_ref().to_path_buf();
        let modified = file_mtime(&path)?;
        let settings = read_settings_file(&path)?;

        *env.values.write() = settings;
        *env.watched_file.write() = Some(WatchedFile { path, modified });
        Ok(env)
    }

    /// Mark whether a managed host runtime is present.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Get a setting value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Get all setting values.
    pub fn get_all(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }

    /// Set one setting, publishing a batch if the value changed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.apply([(key.into(), Some(value.into()))]);
    }

    /// Remove one setting, publishing a batch if it existed.
    pub fn unset(&self, key: &str) {
        self.apply([(key.to_string(), None)]);
    }

    /// Apply several updates atomically and publish them as a single batch.
    ///
    /// `None` removes a setting. Updates that do not change anything are
    /// dropped; returns the published batch, if any.
    pub fn apply<I>(&self, updates: I) -> Option<ConfigurationChangeEvent>
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let changes = {
            let mut values = self.values.write();
            let mut changes = Vec::new();
            for (key, new_value) in updates {
                let old_value = match &new_value {
                    Some(v) => values.insert(key.clone(), v.clone()),
                    None => values.remove(&key),
                };
                if old_value != new_value {
                    changes.push(EnvironmentChange::ConfigurationSetting {
                        name: key,
                        old_value,
                        new_value,
                    });
                }
            }
            changes
        };

        if changes.is_empty() {
            return None;
        }

        let event = ConfigurationChangeEvent::new(changes);
        self.notify(&event);
        Some(event)
    }

    /// Deliver a batch to every listener, one batch at a time.
    ///
    /// A panicking listener is logged and skipped; delivery to the others
    /// continues.
    pub fn notify(&self, event: &ConfigurationChangeEvent) {
        let _delivering = self.delivery.lock();
        let listeners = self.listeners.read().clone();

        tracing::debug!(
            changes = event.len(),
            listeners = listeners.len(),
            "delivering environment change batch"
        );

        for listener in listeners {
            let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| {
                listener.on_environment_changed(event)
            }));
            if delivered.is_err() {
                tracing::error!("environment change listener panicked");
            }
        }
    }

    /// Number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Path of the watched settings file, if any.
    pub fn watched_path(&self) -> Option<PathBuf> {
        self.watched_file.read().as_ref().map(|w| w.path.clone())
    }

    /// Reload the settings file if it was modified since the last check.
    ///
    /// Keys missing from the file are treated as removed. Returns the
    /// published batch, if anything changed.
    pub fn reload_file(&self) -> Result<Option<ConfigurationChangeEvent>, SettingsFileError> {
        let Some(watched) = self.watched_file.read().clone() else {
            return Ok(None);
        };

        let modified = file_mtime(&watched.path)?;
        if modified <= watched.modified {
            return Ok(None);
        }

        let settings = read_settings_file(&watched.path)?;
        if let Some(w) = self.watched_file.write().as_mut() {
            w.modified = modified;
        }
        tracing::info!(path = ?watched.path, "settings file modified");

        let keys: BTreeSet<String> = self
            .values
            .read()
            .keys()
            .cloned()
            .chain(settings.keys().cloned())
            .collect();
        let updates: Vec<(String, Option<String>)> = keys
            .into_iter()
            .map(|key| {
                let value = settings.get(&key).cloned();
                (key, value)
            })
            .collect();

        Ok(self.apply(updates))
    }

    /// Start the settings file poll loop.
    ///
    /// Does nothing when no file is watched.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start(self: Arc<Self>) {
        if self.watched_file.read().is_none() {
            return;
        }
        let env = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(env.poll_interval);

            loop {
                interval.tick().await;

                if let Err(e) = env.reload_file() {
                    tracing::warn!("failed to reload settings file: {}", e);
                }
            }
        });
    }
}

impl Default for SettingsEnvironment {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SettingsSource for SettingsEnvironment {
    fn get_setting(&self, name: &str) -> Result<Option<String>, SettingsError> {
        Ok(self.get(name))
    }
}

impl HostEnvironment for SettingsEnvironment {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().push(listener);
    }

    fn unsubscribe(&self, listener: &Arc<dyn ChangeListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }
}

fn file_mtime(path: &Path) -> Result<SystemTime, SettingsFileError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| SettingsFileError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a JSON object of settings. Non-string values keep their JSON text.
fn read_settings_file(path: &Path) -> Result<HashMap<String, String>, SettingsFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: HashMap<String, serde_json::Value> =
        serde_json::from_str(&raw).map_err(|source| SettingsFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(parsed
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

/// Errors reading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsFileError {
    #[error("file error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

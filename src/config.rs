use crate::adapters::outbound::db_context::connection_setting_name;
use crate::infrastructure::MAINTENANCE_MODE_SETTING_NAME;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // HTTP settings
    pub listen_addr: String,
    pub debug: bool,

    // Deployment settings source
    pub settings_path: Option<String>,
    pub settings_poll_secs: u64,
    pub maintenance_setting: String,
    pub data_dir: String,

    // Logical databases
    pub registration_db: String,
    pub payments_db: String,

    // Read-model cache
    pub cache_ttl_secs: u64,
    pub seat_types_ttl_secs: u64,
    pub cache_gc_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            debug: false,
            settings_path: None,
            settings_poll_secs: 5,
            maintenance_setting: MAINTENANCE_MODE_SETTING_NAME.to_string(),
            data_dir: ".".to_string(),
            registration_db: "ConferenceRegistration".to_string(),
            payments_db: "Payments".to_string(),
            cache_ttl_secs: 600,
            seat_types_ttl_secs: 60,
            cache_gc_interval_secs: 60,
        }
    }
}

impl Config {
    /// Settings used when no settings file is configured: one SQLite file
    /// per logical database under `data_dir`, maintenance off.
    pub fn standalone_settings(&self) -> Vec<(String, String)> {
        let database = |name: &str| {
            let file = format!("{}.db", name);
            (
                connection_setting_name(name),
                Path::new(&self.data_dir).join(file).to_string_lossy().to_string(),
            )
        };
        vec![
            database(&self.registration_db),
            database(&self.payments_db),
            (self.maintenance_setting.clone(), "false".to_string()),
        ]
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let listen_addr = std::env::var("CONFERENCE_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    let settings_path = std::env::var("CONFERENCE_SETTINGS_PATH").ok();

    let settings_poll_secs = std::env::var("CONFERENCE_SETTINGS_POLL_SECS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .unwrap_or(5);

    let maintenance_setting = std::env::var("CONFERENCE_MAINTENANCE_SETTING")
        .unwrap_or_else(|_| MAINTENANCE_MODE_SETTING_NAME.to_string());

    let data_dir = std::env::var("CONFERENCE_DATA_DIR").unwrap_or_else(|_| ".".to_string());

    let registration_db = std::env::var("CONFERENCE_REGISTRATION_DB")
        .unwrap_or_else(|_| "ConferenceRegistration".to_string());

    let payments_db =
        std::env::var("CONFERENCE_PAYMENTS_DB").unwrap_or_else(|_| "Payments".to_string());

    let cache_ttl_secs = std::env::var("CONFERENCE_CACHE_TTL_SECS")
        .unwrap_or_else(|_| "600".to_string())
        .parse()
        .unwrap_or(600);

    let seat_types_ttl_secs = std::env::var("CONFERENCE_SEAT_TYPES_TTL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    let cache_gc_interval_secs = std::env::var("CONFERENCE_CACHE_GC_INTERVAL_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);

    Ok(Config {
        listen_addr,
        debug,
        settings_path,
        settings_poll_secs,
        maintenance_setting,
        data_dir,
        registration_db,
        payments_db,
        cache_ttl_secs,
        seat_types_ttl_secs,
        cache_gc_interval_secs,
    })
}

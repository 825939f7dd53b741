//! conference-web - Conference Registration Web Host
//!
//! Binary entry point: configuration, logging and the serve loop. The
//! object graph itself is composed by `ApplicationLifecycle::start`.

use conference_web::adapters::inbound::HttpServer;
use conference_web::adapters::outbound::{SettingsEnvironment, SqliteStorageBootstrap};
use conference_web::application::ApplicationLifecycle;
use conference_web::config::load_config;
use conference_web::infrastructure::ShutdownController;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("starting conference-web listen={}", cfg.listen_addr);

    // Deployment settings: a watched JSON file, or local defaults
    let environment = match &cfg.settings_path {
        Some(path) => {
            tracing::info!("loading deployment settings from {}", path);
            Arc::new(SettingsEnvironment::from_file(
                path,
                Duration::from_secs(cfg.settings_poll_secs),
            )?)
        }
        None => {
            tracing::info!("no settings file, using standalone settings under {}", cfg.data_dir);
            let env = SettingsEnvironment::with_settings(cfg.standalone_settings());
            env.set_available(false);
            Arc::new(env)
        }
    };
    environment.clone().start();

    let shutdown = ShutdownController::new();
    let bootstrap = Arc::new(SqliteStorageBootstrap::new(
        environment.clone(),
        cfg.registration_db.clone(),
        cfg.payments_db.clone(),
    ));

    let lifecycle = ApplicationLifecycle::new(
        cfg.clone(),
        environment,
        bootstrap,
        Arc::new(shutdown.clone()),
        Vec::new(),
    );
    let app = lifecycle.start().await?;

    HttpServer::new(cfg.listen_addr.clone(), app.router())
        .run(shutdown.clone())
        .await?;

    app.stop()?;

    let code = shutdown.exit_code();
    if code != 0 {
        tracing::warn!(code, "exiting for recycle");
        std::process::exit(code);
    }
    Ok(())
}

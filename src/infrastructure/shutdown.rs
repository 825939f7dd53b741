//! Graceful Shutdown and Recycle
//!
//! Coordinates process shutdown, whether triggered by an OS signal or by a
//! recycle request from the configuration change watcher.

use crate::domain::ports::RecycleSignal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Exit code telling the supervisor to start a fresh process.
pub const RECYCLE_EXIT_CODE: i32 = 75;

/// Shutdown coordinator for graceful termination.
///
/// Doubles as the host recycle signal: a recycle is a shutdown whose exit
/// code asks the supervisor for a restart.
#[derive(Clone)]
pub struct ShutdownController {
    /// Whether shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Whether the shutdown was requested as a recycle
    recycle_requested: Arc<AtomicBool>,
    /// Broadcast channel for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            recycle_requested: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate graceful shutdown.
    pub fn shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
        }
    }

    /// Check if shutdown has been initiated.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Check if the shutdown should end in a process restart.
    pub fn is_recycle_requested(&self) -> bool {
        self.recycle_requested.load(Ordering::SeqCst)
    }

    /// Process exit code matching how shutdown was requested.
    pub fn exit_code(&self) -> i32 {
        if self.is_recycle_requested() {
            RECYCLE_EXIT_CODE
        } else {
            0
        }
    }

    /// Wait until shutdown has been initiated.
    ///
    /// Suitable for `axum::serve(..).with_graceful_shutdown`.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl RecycleSignal for ShutdownController {
    fn request_recycle(&self) {
        if !self.recycle_requested.swap(true, Ordering::SeqCst) {
            tracing::warn!("process recycle requested");
        }
        self.shutdown();
    }
}

/// Install signal handlers for graceful shutdown.
///
/// Completes when Ctrl+C or SIGTERM is received, or when shutdown was
/// initiated some other way (a recycle request).
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
        _ = controller.wait() => {
            return;
        }
    }

    controller.shutdown();
}

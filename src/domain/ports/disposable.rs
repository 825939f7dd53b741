//! Disposable Port
//!
//! Release hook for components whose lifetime is owned by the container.

/// A component that holds resources released at teardown.
///
/// The container calls `dispose` once per singleton, in reverse
/// construction order. Transient instances are never disposed by the
/// container; they are dropped by whoever resolved them.
pub trait Disposable: Send + Sync {
    /// Release held resources. The default holds nothing.
    fn dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

//! Graceful shutdown.
//!
//! On SIGINT/SIGTERM the wall stops accepting mutations, open event
//! streams are closed so the HTTP server can drain, and the pending
//! snapshot is flushed before the process exits.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::Result;
use crate::wall::PhotoWall;

/// Coordinates shutdown between the wall and long-lived connections.
///
/// Cheap to clone; all clones observe the same trigger.
#[derive(Clone)]
pub struct Shutdown {
    wall: PhotoWall,
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new(wall: PhotoWall) -> Self {
        let (tx, _) = watch::channel(wall.is_shutting_down());
        Self {
            wall,
            tx: Arc::new(tx),
        }
    }

    /// Refuses further mutations and wakes every [`Shutdown::triggered`] waiter.
    ///
    /// Returns false if shutdown was already triggered.
    pub fn trigger(&self) -> bool {
        let first = self.wall.begin_shutdown();
        self.tx.send_replace(true);
        if first {
            info!(in_flight = self.wall.in_flight(), "Shutdown triggered, refusing new mutations");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Shutdown::trigger`] has been called.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let stopped = *rx.borrow_and_update();
            // The sender lives in self, so the channel cannot close here
            if stopped || rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Waits for a termination signal, then triggers shutdown.
    ///
    /// Meant for `axum::serve(..).with_graceful_shutdown(..)`.
    pub async fn on_signal(self) {
        tokio::select! {
            name = signal() => info!(signal = name, "Received termination signal"),
            () = self.triggered() => {},
        }
        self.trigger();
    }

    /// Triggers shutdown if needed and flushes the wall. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the error of the final snapshot write.
    pub async fn finish(&self) -> Result<()> {
        self.trigger();
        self.wall.shutdown().await
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix, with the signal name.
pub async fn signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wall::{RawEntry, WallConfig};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let wall = PhotoWall::open(WallConfig::in_memory(tmp.path())).await?;
        let shutdown = Shutdown::new(wall.clone());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.triggered().await })
        };

        assert!(!shutdown.is_triggered());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        timeout(Duration::from_secs(1), waiter).await??;

        assert!(wall.is_shutting_down());
        Ok(())
    }

    #[tokio::test]
    async fn test_on_signal_returns_after_trigger() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let wall = PhotoWall::open(WallConfig::in_memory(tmp.path())).await?;
        let shutdown = Shutdown::new(wall);

        let serve_future = tokio::spawn(shutdown.clone().on_signal());
        shutdown.trigger();
        timeout(Duration::from_secs(1), serve_future).await??;
        Ok(())
    }

    #[tokio::test]
    async fn test_finish_flushes_after_trigger() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let wall = PhotoWall::open(WallConfig {
            save_debounce: Duration::from_secs(60),
            ..WallConfig::persistent(tmp.path())
        })
        .await?;
        let raw: RawEntry = serde_json::from_value(serde_json::json!({"id": "a"}))?;
        wall.submit_photo(raw).await?;

        let shutdown = Shutdown::new(wall.clone());
        shutdown.trigger();
        shutdown.finish().await?;
        shutdown.finish().await?;

        assert_eq!(wall.snapshot_writes(), 1);
        assert!(tmp.path().join("photos.json").exists());
        Ok(())
    }
}

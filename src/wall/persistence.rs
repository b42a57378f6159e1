//! Snapshot persistence with debounced writes.
//!
//! The whole ledger is written as one JSON array, newest first. A mutation
//! marks the snapshot pending and arms a single timer; every mutation that
//! lands before the timer fires is folded into the same write.
//!
//! Writes are serialized by an async mutex. `flush` cancels the timer and
//! then takes that mutex, so it waits for a write already in progress and
//! no timer write can start after `flush` has consumed the pending flag.

use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::ledger::Ledger;
use super::types::{PhotoRecord, RawEntry};
use crate::error::{Error, Result};
use crate::telemetry;

/// Reads and atomically replaces the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads raw entries.
    ///
    /// A missing or unparsable file yields an empty list; entries that are
    /// not objects are skipped. Neither is fatal.
    pub fn load(&self) -> Vec<RawEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                return Vec::new();
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read snapshot, starting empty");
                return Vec::new();
            },
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Snapshot is not a JSON array, starting empty");
                return Vec::new();
            },
        };

        let total = values.len();
        let entries: Vec<RawEntry> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if entries.len() < total {
            warn!(
                skipped = total - entries.len(),
                "Skipped malformed snapshot entries"
            );
        }
        entries
    }

    /// Writes all records through a temp file renamed over the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, temp file or rename fails.
    pub fn save(&self, records: &[PhotoRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::io(format!("creating snapshot directory {}", dir.display()), e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::io("creating snapshot temp file", e))?;
        serde_json::to_writer(&mut tmp, records)
            .map_err(|e| Error::internal(format!("serializing snapshot: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io("syncing snapshot", e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(format!("replacing {}", self.path.display()), e.error))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SaveState {
    pending: bool,
    /// Outstanding timer: its id and the sender that cancels it.
    timer: Option<(u64, oneshot::Sender<()>)>,
    next_timer_id: u64,
}

struct PersistenceInner {
    store: SnapshotStore,
    delay: Duration,
    ledger: Arc<RwLock<Ledger>>,
    state: Mutex<SaveState>,
    write_lock: tokio::sync::Mutex<()>,
    writes: AtomicU64,
    failures: AtomicU64,
}

/// Debounced snapshot writer for one ledger.
#[derive(Clone)]
pub struct Persistence {
    inner: Arc<PersistenceInner>,
}

impl Persistence {
    pub fn new(store: SnapshotStore, delay: Duration, ledger: Arc<RwLock<Ledger>>) -> Self {
        Self {
            inner: Arc::new(PersistenceInner {
                store,
                delay,
                ledger,
                state: Mutex::new(SaveState::default()),
                write_lock: tokio::sync::Mutex::new(()),
                writes: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    /// Records that the ledger changed and arms the timer if idle.
    ///
    /// Must be called from within a tokio runtime, and never while holding
    /// the ledger lock.
    pub fn mark_dirty(&self) {
        let mut state = self.inner.state.lock();
        state.pending = true;
        if state.timer.is_some() {
            return;
        }

        let id = state.next_timer_id;
        state.next_timer_id += 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        state.timer = Some((id, cancel_tx));
        drop(state);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(inner.delay) => {},
                _ = cancel_rx => {
                    debug!(timer = id, "Snapshot timer cancelled");
                    return;
                },
            }

            {
                let mut state = inner.state.lock();
                if state.timer.as_ref().is_some_and(|(current, _)| *current == id) {
                    state.timer = None;
                }
            }

            if let Err(e) = inner.save_if_pending().await {
                error!(error = %e, "Debounced snapshot write failed");
            }
        });
    }

    /// Cancels the timer and writes now if anything is pending.
    ///
    /// Returns whether a snapshot was written.
    ///
    /// # Errors
    ///
    /// Returns the write error, leaving the snapshot pending.
    pub async fn flush(&self) -> Result<bool> {
        let timer = self.inner.state.lock().timer.take();
        if let Some((id, cancel)) = timer {
            debug!(timer = id, "Cancelling snapshot timer for flush");
            let _ = cancel.send(());
        }
        self.inner.save_if_pending().await
    }

    /// Whether a write is pending.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending
    }

    /// Number of successful snapshot writes.
    pub fn writes(&self) -> u64 {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Number of failed snapshot writes.
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }
}

impl PersistenceInner {
    async fn save_if_pending(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        {
            let mut state = self.state.lock();
            if !state.pending {
                return Ok(false);
            }
            state.pending = false;
        }
        let records = self.ledger.read().list();
        let count = records.len();

        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || store.save(&records))
            .await
            .map_err(|e| Error::internal(format!("snapshot task failed: {e}")))
            .and_then(|r| r);

        match result {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                telemetry::record_snapshot_write(true);
                debug!(photos = count, path = %self.store.path().display(), "Snapshot written");
                Ok(true)
            },
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                telemetry::record_snapshot_write(false);
                // Retry on the next mutation or flush
                self.state.lock().pending = true;
                Err(e)
            },
        }
    }
}

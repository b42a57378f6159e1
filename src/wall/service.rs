//! Main photo wall service.
//!
//! `PhotoWall` owns every piece of shared state (ledger, admission slots,
//! save timer, shutdown flag) and wires the ingestion and deletion
//! pipelines together.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::admission::AdmissionController;
use super::broadcast::{Broadcaster, WallEvent};
use super::images::ImageStore;
use super::ledger::{Ledger, sanitize};
use super::moderation::{CaptionModerator, ModerationPolicy, check_caption};
use super::normalize::{Normalizer, base_record, image_file_name};
use super::persistence::{Persistence, SnapshotStore};
use super::types::{PhotoRecord, PublicPhotoView, RawEntry, WallConfig};
use crate::constants;
use crate::error::{Error, Result};
use crate::telemetry;

/// Internal state for the photo wall.
pub(crate) struct WallInner {
    config: WallConfig,
    ledger: Arc<RwLock<Ledger>>,
    images: ImageStore,
    normalizer: Normalizer,
    admission: AdmissionController,
    broadcaster: Broadcaster,
    /// `None` in pure in-memory mode.
    persistence: Option<Persistence>,
    moderator: Option<Arc<dyn CaptionModerator>>,
    moderation_policy: ModerationPolicy,
    /// Claimed ids: submissions between validation and insertion, and
    /// records whose image file is still being released.
    reserved: Mutex<HashMap<String, usize>>,
    shutting_down: AtomicBool,
    /// Set once the final flush has started.
    stopped: AtomicBool,
}

/// Shared, real-time photo wall.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct PhotoWall {
    inner: Arc<WallInner>,
}

/// Builder for [`PhotoWall`].
pub struct PhotoWallBuilder {
    config: WallConfig,
    moderator: Option<Arc<dyn CaptionModerator>>,
}

impl PhotoWallBuilder {
    /// Plugs in an external caption reviewer.
    #[must_use]
    pub fn moderator(mut self, moderator: Arc<dyn CaptionModerator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    /// Opens the wall, restoring the snapshot when persistence is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable or the image
    /// directory cannot be created. A missing or corrupt snapshot is not
    /// an error.
    pub async fn open(self) -> Result<PhotoWall> {
        let config = self.config;
        if config.max_photos == 0 {
            return Err(Error::Config("max_photos must be at least 1".to_string()));
        }
        if config.max_concurrent_uploads == 0 {
            return Err(Error::Config(
                "max_concurrent_uploads must be at least 1".to_string(),
            ));
        }

        let images = ImageStore::open(&config.uploads_dir, config.uploads_url_prefix.clone())?;
        let ledger = Arc::new(RwLock::new(Ledger::new(config.max_photos)));
        let persistence = config.snapshot_path.as_ref().map(|path| {
            Persistence::new(
                SnapshotStore::new(path),
                config.save_debounce,
                Arc::clone(&ledger),
            )
        });

        let wall = PhotoWall {
            inner: Arc::new(WallInner {
                normalizer: Normalizer::new(images.clone()),
                admission: AdmissionController::new(
                    config.max_concurrent_uploads,
                    config.max_image_bytes,
                ),
                broadcaster: Broadcaster::new(constants::EVENT_CHANNEL_CAPACITY),
                moderation_policy: ModerationPolicy {
                    fail_open: config.moderation_fail_open,
                },
                moderator: self.moderator,
                reserved: Mutex::new(HashMap::new()),
                shutting_down: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                config,
                ledger,
                images,
                persistence,
            }),
        };

        if wall.inner.persistence.is_some() {
            wall.restore().await?;
        } else {
            info!("Persistence disabled, photos live in memory only");
        }
        telemetry::set_photo_count(wall.len());

        Ok(wall)
    }
}

/// Claim on an id, released on drop however the holder finishes.
///
/// Claims are counted: a file release may overlap the tail of the
/// submission that inserted the same id.
pub(super) struct IdReservation<'a> {
    reserved: &'a Mutex<HashMap<String, usize>>,
    id: String,
}

impl<'a> IdReservation<'a> {
    /// Adds a claim through an already locked map.
    fn claim(
        reserved: &'a Mutex<HashMap<String, usize>>,
        held: &mut HashMap<String, usize>,
        id: &str,
    ) -> Self {
        *held.entry(id.to_string()).or_default() += 1;
        Self {
            reserved,
            id: id.to_string(),
        }
    }
}

impl Drop for IdReservation<'_> {
    fn drop(&mut self) {
        let mut reserved = self.reserved.lock();
        if let Some(count) = reserved.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                reserved.remove(&self.id);
            }
        }
    }
}

/// A committed submission and the records it pushed out.
struct Committed<'a> {
    view: PublicPhotoView,
    evicted: Vec<PhotoRecord>,
    /// Held until the evicted files are gone.
    _releasing: Vec<IdReservation<'a>>,
}

impl PhotoWall {
    /// Start building a wall with the given configuration.
    pub fn builder(config: WallConfig) -> PhotoWallBuilder {
        PhotoWallBuilder {
            config,
            moderator: None,
        }
    }

    /// Opens a wall without a caption moderator.
    ///
    /// # Errors
    ///
    /// See [`PhotoWallBuilder::open`].
    pub async fn open(config: WallConfig) -> Result<Self> {
        Self::builder(config).open().await
    }

    /// Current photos, newest first.
    pub fn list_photos(&self) -> Vec<PublicPhotoView> {
        let ledger = self.inner.ledger.read();
        ledger
            .iter()
            .map(|record| sanitize(record, &self.inner.images))
            .collect()
    }

    /// One photo by id.
    pub fn get_photo(&self, id: &str) -> Option<PublicPhotoView> {
        let ledger = self.inner.ledger.read();
        ledger.get(id).map(|record| sanitize(record, &self.inner.images))
    }

    /// Runs the full ingestion pipeline for one submission.
    ///
    /// # Errors
    ///
    /// - [`Error::Capacity`] when too many submissions are in flight
    /// - [`Error::Validation`] for bad payloads, duplicate ids or rejected captions
    /// - [`Error::StorageIo`] when the image cannot be written
    /// - [`Error::ShuttingDown`] once shutdown has begun
    pub async fn submit_photo(&self, raw: RawEntry) -> Result<PublicPhotoView> {
        let result = self.ingest(raw).await;
        match &result {
            Ok(view) => {
                telemetry::record_submission("accepted");
                info!(target: "wall", id = %view.id, has_image = view.image_url.is_some(), "Photo accepted");
            },
            Err(e) => {
                telemetry::record_submission(e.kind());
                match e {
                    Error::StorageIo { .. } | Error::Internal(_) | Error::Config(_) => {
                        error!(target: "wall", error = %e, "Submission failed");
                    },
                    _ => info!(target: "wall", outcome = e.kind(), reason = %e, "Submission refused"),
                }
            },
        }
        result
    }

    async fn ingest(&self, raw: RawEntry) -> Result<PublicPhotoView> {
        self.ensure_accepting()?;

        let caption = raw.caption.as_str().unwrap_or_default();
        check_caption(
            self.inner.moderator.as_deref(),
            self.inner.moderation_policy,
            caption,
        )
        .await?;

        let _permit = self.inner.admission.try_admit()?;
        let image = self.inner.admission.validate(&raw)?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let mut record = base_record(&raw, now_ms)
            .ok_or_else(|| Error::validation("id must be a non-empty string"))?;
        let _reservation = self.reserve(&record.id)?;

        // Client-supplied storage file names are never trusted on submit
        if let Some(image) = image {
            let name = image_file_name(&record.id, image.extension());
            self.inner
                .images
                .write_async(name.clone(), image.bytes)
                .await?;
            record.storage_file = Some(name);
        }

        match self.commit(record.clone()) {
            Ok(committed) => {
                self.release_files(&committed.evicted).await;
                self.mark_dirty();
                Ok(committed.view)
            },
            Err(e) => {
                if let Some(name) = record.storage_file {
                    if let Err(cleanup) = self.inner.images.delete_async(name).await {
                        warn!(error = %cleanup, "Failed to remove image of failed submission");
                    }
                }
                Err(e)
            },
        }
    }

    /// Inserts and announces a record in one critical section.
    ///
    /// Publishing under the ledger lock keeps each viewer's created/deleted
    /// order identical to the order the ledger saw. Evicted ids stay claimed
    /// until their files are released, so a resubmission cannot write a
    /// file that is about to be unlinked.
    fn commit(&self, record: PhotoRecord) -> Result<Committed<'_>> {
        let mut reserved = self.inner.reserved.lock();
        let mut ledger = self.inner.ledger.write();
        self.ensure_accepting()?;

        let view = sanitize(&record, &self.inner.images);
        let evicted = ledger.insert(record)?;
        self.inner.broadcaster.publish_created(view.clone());
        telemetry::set_photo_count(ledger.len());

        let releasing = evicted
            .iter()
            .map(|gone| IdReservation::claim(&self.inner.reserved, &mut reserved, &gone.id))
            .collect();
        Ok(Committed {
            view,
            evicted,
            _releasing: releasing,
        })
    }

    /// Removes a photo, announces it and releases its image file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown ids and
    /// [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn delete_photo(&self, id: &str) -> Result<PublicPhotoView> {
        self.ensure_accepting()?;

        // The id stays claimed until its file is gone
        let (record, _releasing) = {
            let mut reserved = self.inner.reserved.lock();
            let mut ledger = self.inner.ledger.write();
            let record = ledger.remove(id).ok_or_else(|| Error::not_found(id))?;
            self.inner.broadcaster.publish_deleted(record.id.clone());
            telemetry::set_photo_count(ledger.len());
            let claim = IdReservation::claim(&self.inner.reserved, &mut reserved, &record.id);
            (record, claim)
        };

        info!(target: "wall", id = %record.id, "Photo deleted");
        telemetry::record_deletion();

        let view = sanitize(&record, &self.inner.images);
        self.release_files(std::slice::from_ref(&record)).await;
        self.mark_dirty();
        Ok(view)
    }

    /// New receiver for wall events. Events published earlier are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<WallEvent> {
        self.inner.broadcaster.subscribe()
    }

    /// Runs `callback` for every future accepted photo.
    pub fn on_photo_created<F>(&self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&PublicPhotoView) + Send + Sync + 'static,
    {
        self.inner.broadcaster.on_photo_created(callback)
    }

    /// Runs `callback` for every future explicit deletion.
    pub fn on_photo_deleted<F>(&self, callback: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.broadcaster.on_photo_deleted(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcaster.subscriber_count()
    }

    /// Admission controller, for callers that need to inspect capacity.
    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    /// Submissions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.admission.in_flight()
    }

    pub fn len(&self) -> usize {
        self.inner.ledger.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.ledger.read().is_empty()
    }

    pub fn config(&self) -> &WallConfig {
        &self.inner.config
    }

    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }

    pub fn persistence_enabled(&self) -> bool {
        self.inner.persistence.is_some()
    }

    /// Successful snapshot writes since startup; always 0 in memory mode.
    pub fn snapshot_writes(&self) -> u64 {
        self.inner.persistence.as_ref().map_or(0, Persistence::writes)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Sets the shutdown flag. Returns false if it was already set.
    pub fn begin_shutdown(&self) -> bool {
        !self.inner.shutting_down.swap(true, Ordering::SeqCst)
    }

    /// Stops accepting mutations and flushes the pending snapshot.
    ///
    /// Works whether or not [`PhotoWall::begin_shutdown`] ran first. Calling
    /// it again while a shutdown is running or done is a no-op. Submissions
    /// already past admission are not awaited.
    ///
    /// # Errors
    ///
    /// Returns the error of the final snapshot write.
    pub async fn shutdown(&self) -> Result<()> {
        self.begin_shutdown();
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already in progress");
            return Ok(());
        }

        let in_flight = self.in_flight();
        if in_flight > 0 {
            warn!(in_flight, "Shutting down with submissions in flight; they will not be awaited");
        }

        let Some(persistence) = &self.inner.persistence else {
            info!("Photo wall stopped (in-memory mode, nothing to flush)");
            return Ok(());
        };

        match persistence.flush().await {
            Ok(true) => info!(photos = self.len(), "Final snapshot written"),
            Ok(false) => info!("Snapshot already up to date"),
            Err(e) => {
                error!(error = %e, "Final snapshot write failed");
                return Err(e);
            },
        }
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.is_shutting_down() {
            Err(Error::ShuttingDown)
        } else {
            Ok(())
        }
    }

    /// Claims an id for a new submission.
    ///
    /// Lock order everywhere is claims first, then the ledger.
    pub(super) fn reserve(&self, id: &str) -> Result<IdReservation<'_>> {
        let mut reserved = self.inner.reserved.lock();
        if self.inner.ledger.read().contains(id) {
            return Err(Error::validation(format!("photo '{id}' already exists")));
        }
        if reserved.contains_key(id) {
            return Err(Error::validation(format!(
                "photo '{id}' is still being processed"
            )));
        }
        Ok(IdReservation::claim(&self.inner.reserved, &mut reserved, id))
    }

    fn mark_dirty(&self) {
        if let Some(persistence) = &self.inner.persistence {
            persistence.mark_dirty();
        }
    }

    /// Deletes the image files of records that left the ledger.
    ///
    /// Best-effort: failures are logged and swallowed. A file still
    /// referenced by a live record is kept. Callers hold a claim on each
    /// released id, so no new record can take one of these names meanwhile.
    async fn release_files(&self, records: &[PhotoRecord]) {
        if records.iter().all(|record| record.storage_file.is_none()) {
            return;
        }
        let live: HashSet<String> = self
            .inner
            .ledger
            .read()
            .iter()
            .filter_map(|record| record.storage_file.clone())
            .collect();

        for record in records {
            let Some(name) = record.storage_file.as_deref() else {
                continue;
            };
            if live.contains(name) {
                warn!(id = %record.id, file = %name, "Image still referenced, keeping file");
                continue;
            }

            match self.inner.images.delete_async(name.to_string()).await {
                Ok(true) => debug!(id = %record.id, file = %name, "Released image"),
                Ok(false) => debug!(id = %record.id, file = %name, "Image already gone"),
                Err(e) => warn!(id = %record.id, error = %e, "Failed to release image"),
            }
        }
    }

    /// Restores the snapshot into the ledger.
    async fn restore(&self) -> Result<()> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };

        let store = persistence.store().clone();
        let entries = tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| Error::internal(format!("snapshot load task failed: {e}")))?;

        let total = entries.len();
        let mut changed = false;
        let mut restored = Vec::with_capacity(total);
        for raw in &entries {
            match self.inner.normalizer.normalize_entry(raw).await {
                Some(normalized) => {
                    changed |= normalized.migrated;
                    restored.push(normalized.record);
                },
                None => {
                    warn!("Skipping snapshot entry without a valid id");
                    changed = true;
                },
            }
        }

        let evicted = {
            let mut ledger = self.inner.ledger.write();
            for record in restored {
                let id = record.id.clone();
                if !ledger.append_loaded(record) {
                    warn!(%id, "Skipping duplicate snapshot entry");
                    changed = true;
                }
            }
            ledger.evict_overflow()
        };

        if !evicted.is_empty() {
            info!(
                target: "wall",
                evicted = evicted.len(),
                max_photos = self.inner.config.max_photos,
                "Snapshot exceeded retention bound, evicting oldest"
            );
            telemetry::record_evictions(evicted.len());
            self.release_files(&evicted).await;
            changed = true;
        }

        info!(
            photos = self.len(),
            entries = total,
            path = %persistence.store().path().display(),
            "Restored snapshot"
        );

        if changed {
            persistence.mark_dirty();
        }
        Ok(())
    }
}

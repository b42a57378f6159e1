//! Core types for the photo wall.
//!
//! Contains the canonical stored record, the loosely typed inbound shape,
//! the public view sent to viewers, and the runtime configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

/// Canonical, server-owned photo record.
///
/// Records are immutable once accepted. Replacing one means deleting it and
/// submitting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Caller-supplied unique identifier.
    pub id: String,
    /// Caption text, possibly empty.
    #[serde(default)]
    pub caption: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Presentation-only rotation hint.
    #[serde(default)]
    pub rotation: f64,
    /// Opaque author string, passed through unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Name of the backing image file; `None` for text-only records.
    #[serde(default)]
    pub storage_file: Option<String>,
}

/// Inbound submission or persisted snapshot entry, before normalization.
///
/// Every field is kept as raw JSON so that missing or wrongly typed values
/// can be defaulted instead of failing the whole entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub caption: serde_json::Value,
    #[serde(default)]
    pub timestamp: serde_json::Value,
    #[serde(default)]
    pub rotation: serde_json::Value,
    #[serde(default)]
    pub author: serde_json::Value,
    #[serde(default)]
    pub storage_file: serde_json::Value,
    /// Inline image as a data URL or bare base64.
    #[serde(default)]
    pub image: serde_json::Value,
    /// Legacy snapshots kept the inline data URL here.
    #[serde(default)]
    pub image_url: serde_json::Value,
}

impl RawEntry {
    /// The identifier if it is a non-empty string.
    pub fn id(&self) -> Option<&str> {
        self.id.as_str().filter(|id| !id.trim().is_empty())
    }

    /// The trusted file reference, if any.
    pub fn storage_file(&self) -> Option<&str> {
        self.storage_file.as_str().filter(|name| !name.is_empty())
    }

    /// The inline image payload, if any.
    ///
    /// `image` wins; `imageUrl` only counts when it carries a `data:` URL,
    /// since older snapshots also stored plain URLs there.
    pub fn inline_image(&self) -> Option<&str> {
        if let Some(image) = self.image.as_str().filter(|s| !s.is_empty()) {
            return Some(image);
        }
        self.image_url.as_str().filter(|s| s.starts_with("data:"))
    }
}

/// Representation sent to viewers and list queries.
///
/// Never carries the storage file name or any filesystem path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicPhotoView {
    pub id: String,
    pub caption: String,
    pub timestamp: i64,
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Server-relative image reference, `None` for text-only photos.
    pub image_url: Option<String>,
}

/// Runtime configuration for a [`super::PhotoWall`].
#[derive(Debug, Clone)]
pub struct WallConfig {
    /// Retention bound; older photos are evicted beyond this.
    pub max_photos: usize,
    /// Concurrent submissions admitted before answering busy.
    pub max_concurrent_uploads: usize,
    /// Maximum decoded image size in bytes.
    pub max_image_bytes: usize,
    /// Delay between the first unsaved mutation and the snapshot write.
    pub save_debounce: Duration,
    /// Snapshot file; `None` keeps the wall purely in memory.
    pub snapshot_path: Option<PathBuf>,
    /// Directory holding image files.
    pub uploads_dir: PathBuf,
    /// URL prefix used to build `imageUrl`.
    pub uploads_url_prefix: String,
    /// Accept submissions when the caption moderator fails.
    pub moderation_fail_open: bool,
}

impl WallConfig {
    /// In-memory configuration storing images under `uploads_dir`.
    pub fn in_memory(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_photos: constants::DEFAULT_MAX_PHOTOS,
            max_concurrent_uploads: constants::DEFAULT_MAX_CONCURRENT_UPLOADS,
            max_image_bytes: constants::DEFAULT_MAX_IMAGE_BYTES,
            save_debounce: Duration::from_millis(constants::DEFAULT_SAVE_DEBOUNCE_MS),
            snapshot_path: None,
            uploads_dir: uploads_dir.into(),
            uploads_url_prefix: constants::UPLOADS_URL_PREFIX.to_string(),
            moderation_fail_open: true,
        }
    }

    /// Disk-backed configuration rooted at `data_dir`.
    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            snapshot_path: Some(data_dir.join(constants::SNAPSHOT_FILE_NAME)),
            ..Self::in_memory(data_dir.join(constants::UPLOADS_DIR_NAME))
        }
    }

    /// Whether snapshots are read and written.
    pub fn persistence_enabled(&self) -> bool {
        self.snapshot_path.is_some()
    }
}

//! Default limits and well-known names shared across the crate.

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default number of photos kept on the wall before the oldest roll off.
pub const DEFAULT_MAX_PHOTOS: usize = 100;

/// Default number of submissions processed at the same time.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 8;

/// Default maximum decoded image size (3 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 3 * 1024 * 1024;

/// Default delay between the first unsaved mutation and the snapshot write.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;

/// Default directory holding the snapshot and uploaded images.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "photos.json";

/// Image directory name inside the data directory.
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// URL prefix under which image files are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Buffered events per subscriber before a slow viewer starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Extra request body allowance on top of the encoded image size.
pub const BODY_LIMIT_SLACK_BYTES: usize = 64 * 1024;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "photowall.toml";

/// Status string reported by `/health`.
pub const HEALTH_STATUS_READY: &str = "ready";

/// Status string reported by `/health` once shutdown has begun.
pub const HEALTH_STATUS_DRAINING: &str = "draining";

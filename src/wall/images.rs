//! Image file store.
//!
//! Writes and deletes image payloads inside one base directory. Pure I/O:
//! no knowledge of records, retention or events.
//!
//! # Async Usage
//!
//! File operations are blocking. From async contexts use `write_async` and
//! `delete_async`, which run the work on the blocking pool.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Filesystem-backed image store.
///
/// `ImageStore` is `Clone` and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct ImageStore {
    inner: Arc<ImageStoreInner>,
}

#[derive(Debug)]
struct ImageStoreInner {
    base_dir: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    /// Opens the store, creating the base directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(base_dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|e| {
            Error::io(
                format!("creating image directory {}", base_dir.display()),
                e,
            )
        })?;

        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Ok(Self {
            inner: Arc::new(ImageStoreInner {
                base_dir,
                url_prefix,
            }),
        })
    }

    /// Base directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.inner.base_dir
    }

    /// Writes `bytes` under `name`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unsafe names and a storage error if
    /// the file cannot be written.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        fs::write(&path, bytes).map_err(|e| Error::io(format!("writing image {name}"), e))
    }

    /// Deletes the file stored under `name`.
    ///
    /// Returns `Ok(false)` if the file did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for unsafe names or if removal fails for a reason
    /// other than the file being absent.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(format!("deleting image {name}"), e)),
        }
    }

    /// Whether a file is stored under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }

    /// Server-relative URL for an image name.
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{name}", self.inner.url_prefix)
    }

    /// Inverse of [`ImageStore::url_for`] for URLs under this store's prefix.
    pub fn name_from_url(&self, url: &str) -> Option<String> {
        let name = url
            .strip_prefix(self.inner.url_prefix.as_str())?
            .strip_prefix('/')?;
        validate_name(name).ok()?;
        Some(name.to_string())
    }

    /// Filesystem path for an image name.
    pub(crate) fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.inner.base_dir.join(name))
    }

    /// Async version of [`ImageStore::write`].
    pub async fn write_async(&self, name: String, bytes: Vec<u8>) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write(&name, &bytes))
            .await
            .map_err(|e| Error::internal(format!("image write task failed: {e}")))?
    }

    /// Async version of [`ImageStore::delete`].
    pub async fn delete_async(&self, name: String) -> Result<bool> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.delete(&name))
            .await
            .map_err(|e| Error::internal(format!("image delete task failed: {e}")))?
    }
}

/// Rejects names that are empty or are anything but one plain file name.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("image name cannot be empty"));
    }
    if name.contains(['/', '\\']) {
        return Err(Error::validation(format!(
            "image name cannot contain path separators: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::validation(format!("invalid image name: {name}"))),
    }
}

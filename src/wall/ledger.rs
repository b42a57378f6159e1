//! Photo ledger: the ordered, bounded in-memory history.
//!
//! Newest records sit at the front. The ledger only tracks records; the
//! owning service releases image files for whatever it evicts or removes.

use std::collections::VecDeque;

use super::images::ImageStore;
use super::types::{PhotoRecord, PublicPhotoView};
use crate::error::{Error, Result};

/// Ordered collection of accepted photos.
#[derive(Debug)]
pub struct Ledger {
    records: VecDeque<PhotoRecord>,
    max_photos: usize,
}

impl Ledger {
    /// Create an empty ledger holding at most `max_photos` records.
    pub fn new(max_photos: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_photos.min(1024)),
            max_photos,
        }
    }

    /// Retention bound.
    pub fn max_photos(&self) -> usize {
        self.max_photos
    }

    /// Prepends a record, then evicts overflow.
    ///
    /// Returns the evicted records, oldest last.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a record with the same id is live.
    pub fn insert(&mut self, record: PhotoRecord) -> Result<Vec<PhotoRecord>> {
        if self.contains(&record.id) {
            return Err(Error::validation(format!(
                "photo '{}' already exists",
                record.id
            )));
        }
        self.records.push_front(record);
        Ok(self.evict_overflow())
    }

    /// Appends a restored record at the tail, skipping duplicate ids.
    ///
    /// Used only while loading a snapshot, which is stored newest first.
    /// Returns false when the id was already present.
    pub(crate) fn append_loaded(&mut self, record: PhotoRecord) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.records.push_back(record);
        true
    }

    /// Removes the oldest records while the ledger is over its bound.
    pub fn evict_overflow(&mut self) -> Vec<PhotoRecord> {
        let overflow = self.records.len().saturating_sub(self.max_photos);
        let mut evicted = Vec::with_capacity(overflow);
        while self.records.len() > self.max_photos {
            if let Some(record) = self.records.pop_back() {
                evicted.push(record);
            }
        }
        evicted
    }

    /// Removes and returns the record with the given id.
    pub fn remove(&mut self, id: &str) -> Option<PhotoRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        self.records.remove(index)
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &str) -> Option<&PhotoRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of all records, newest first.
    pub fn list(&self) -> Vec<PhotoRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Public view of a record: drops the storage file name and exposes a URL.
pub fn sanitize(record: &PhotoRecord, images: &ImageStore) -> PublicPhotoView {
    PublicPhotoView {
        id: record.id.clone(),
        caption: record.caption.clone(),
        timestamp: record.timestamp,
        rotation: record.rotation,
        author: record.author.clone(),
        image_url: record.storage_file.as_deref().map(|name| images.url_for(name)),
    }
}

//! Record normalization and legacy image migration.
//!
//! Turns a loosely typed [`RawEntry`] into a canonical [`PhotoRecord`].
//! The decision part ([`canonicalize`]) is pure so it can be tested without
//! touching the filesystem; [`Normalizer`] applies its outcome against the
//! image store.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use super::images::ImageStore;
use super::types::{PhotoRecord, RawEntry};
use crate::error::{Error, Result};

/// Decoded inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Declared MIME type.
    pub mime: String,
    /// Decoded bytes.
    pub bytes: Vec<u8>,
}

impl InlineImage {
    /// File extension derived from the declared type.
    pub fn extension(&self) -> &'static str {
        extension_for(&self.mime)
    }
}

/// Where the image of a canonical record comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Text-only record.
    None,
    /// Already backed by a file; trusted as-is.
    Stored(String),
    /// Inline payload that still has to be written to disk.
    Inline(InlineImage),
    /// Legacy plain URL pointing into the uploads directory.
    LegacyUrl(String),
    /// Inline payload that could not be decoded.
    Undecodable(String),
}

/// Outcome of the pure normalization step.
#[derive(Debug, Clone, PartialEq)]
pub struct Canonical {
    /// Record with `storage_file` set only for [`ImageSource::Stored`].
    pub record: PhotoRecord,
    pub image: ImageSource,
}

/// A normalized record and whether it had to be migrated.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: PhotoRecord,
    /// True when the stored shape differs from what was read.
    pub migrated: bool,
}

/// Builds the record fields shared by every path, without any image.
///
/// Returns `None` when the entry has no usable identifier.
pub fn base_record(raw: &RawEntry, now_ms: i64) -> Option<PhotoRecord> {
    let id = raw.id()?;

    let caption = raw.caption.as_str().unwrap_or_default().to_string();
    let timestamp = raw
        .timestamp
        .as_i64()
        .or_else(|| {
            raw.timestamp
                .as_f64()
                .filter(|t| t.is_finite())
                .map(|t| t as i64)
        })
        .unwrap_or(now_ms);
    let rotation = raw
        .rotation
        .as_f64()
        .filter(|r| r.is_finite())
        .unwrap_or(0.0);
    let author = raw.author.as_str().map(str::to_string);

    Some(PhotoRecord {
        id: id.to_string(),
        caption,
        timestamp,
        rotation,
        author,
        storage_file: None,
    })
}

/// Pure normalization: defaults fields and classifies the image.
pub fn canonicalize(raw: &RawEntry, now_ms: i64) -> Option<Canonical> {
    let mut record = base_record(raw, now_ms)?;

    let image = if let Some(name) = raw.storage_file() {
        record.storage_file = Some(name.to_string());
        ImageSource::Stored(name.to_string())
    } else if let Some(inline) = raw.inline_image() {
        match decode_inline_image(inline) {
            Ok(image) => ImageSource::Inline(image),
            Err(e) => ImageSource::Undecodable(e.to_string()),
        }
    } else if let Some(url) = raw.image_url.as_str().filter(|u| !u.is_empty()) {
        ImageSource::LegacyUrl(url.to_string())
    } else {
        ImageSource::None
    };

    Some(Canonical { record, image })
}

/// Decodes a `data:<mime>;base64,<payload>` URL or bare base64.
///
/// # Errors
///
/// Returns a validation error for non-image types, encodings other than
/// base64, invalid base64 and empty payloads.
pub fn decode_inline_image(text: &str) -> Result<InlineImage> {
    let (mime, payload) = match text.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| Error::validation("malformed data URL"))?;
            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
                return Err(Error::validation("unsupported image encoding"));
            }
            let mime = if mime.is_empty() {
                "image/jpeg".to_string()
            } else {
                mime
            };
            if !mime.starts_with("image/") {
                return Err(Error::validation(format!("unsupported image type: {mime}")));
            }
            (mime, payload)
        },
        None => ("image/jpeg".to_string(), text),
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| Error::validation(format!("image is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(Error::validation("image is empty"));
    }

    Ok(InlineImage { mime, bytes })
}

/// Upper bound of the decoded size of an inline image, from its length.
pub fn estimated_decoded_len(text: &str) -> usize {
    let payload = text
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(',').map(|(_, p)| p))
        .unwrap_or(text);
    payload.trim().len().div_ceil(4) * 3
}

/// `png` for PNG images, `jpg` for anything else.
pub fn extension_for(mime: &str) -> &'static str {
    if mime.eq_ignore_ascii_case("image/png") {
        "png"
    } else {
        "jpg"
    }
}

/// Deterministic, filesystem-safe image name for a record id.
pub fn image_file_name(id: &str, extension: &str) -> String {
    let hash = blake3::hash(id.as_bytes());
    format!("photo-{}.{extension}", hex::encode(&hash.as_bytes()[..8]))
}

/// Applies [`canonicalize`] against the image store.
#[derive(Debug, Clone)]
pub struct Normalizer {
    images: ImageStore,
}

impl Normalizer {
    pub fn new(images: ImageStore) -> Self {
        Self { images }
    }

    /// Normalizes an entry, writing inline images to disk.
    ///
    /// Returns `None` for entries without a valid id.
    pub async fn normalize(&self, raw: &RawEntry) -> Option<PhotoRecord> {
        self.normalize_entry(raw).await.map(|n| n.record)
    }

    /// Like [`Normalizer::normalize`], also reporting whether migration happened.
    ///
    /// Migration is best-effort: a record whose image cannot be written
    /// keeps its caption and loses the image.
    pub async fn normalize_entry(&self, raw: &RawEntry) -> Option<Normalized> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let Canonical { mut record, image } = canonicalize(raw, now_ms)?;

        let migrated = match image {
            ImageSource::None | ImageSource::Stored(_) => false,
            ImageSource::Inline(image) => {
                let name = image_file_name(&record.id, image.extension());
                match self.images.write_async(name.clone(), image.bytes).await {
                    Ok(()) => {
                        debug!(id = %record.id, file = %name, "Migrated inline image to file");
                        record.storage_file = Some(name);
                    },
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "Image migration failed, keeping caption only");
                    },
                }
                true
            },
            ImageSource::LegacyUrl(url) => {
                match self.images.name_from_url(&url) {
                    Some(name) if self.images.exists(&name) => {
                        record.storage_file = Some(name);
                    },
                    _ => {
                        warn!(id = %record.id, %url, "Legacy image URL has no local file, keeping caption only");
                    },
                }
                true
            },
            ImageSource::Undecodable(reason) => {
                warn!(id = %record.id, %reason, "Legacy inline image undecodable, keeping caption only");
                true
            },
        };

        Some(Normalized { record, migrated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000_000;

    fn raw(value: serde_json::Value) -> RawEntry {
        serde_json::from_value(value).unwrap()
    }

    fn png_data_url(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(bytes))
    }

    #[test]
    fn test_missing_id_is_skipped() {
        assert!(canonicalize(&raw(json!({"caption": "hi"})), NOW).is_none());
        assert!(canonicalize(&raw(json!({"id": ""})), NOW).is_none());
        assert!(canonicalize(&raw(json!({"id": 42})), NOW).is_none());
    }

    #[test]
    fn test_defaults_for_invalid_fields() {
        let canonical = canonicalize(
            &raw(json!({
                "id": "a",
                "caption": 7,
                "timestamp": "yesterday",
                "rotation": "left",
                "author": null
            })),
            NOW,
        )
        .unwrap();

        assert_eq!(canonical.record.id, "a");
        assert_eq!(canonical.record.caption, "");
        assert_eq!(canonical.record.timestamp, NOW);
        assert_eq!(canonical.record.rotation, 0.0);
        assert_eq!(canonical.record.author, None);
        assert_eq!(canonical.image, ImageSource::None);
    }

    #[test]
    fn test_fields_pass_through() {
        let canonical = canonicalize(
            &raw(json!({
                "id": "b",
                "caption": "hello",
                "timestamp": 1234.0,
                "rotation": -2.5,
                "author": "sam"
            })),
            NOW,
        )
        .unwrap();

        assert_eq!(canonical.record.caption, "hello");
        assert_eq!(canonical.record.timestamp, 1234);
        assert_eq!(canonical.record.rotation, -2.5);
        assert_eq!(canonical.record.author.as_deref(), Some("sam"));
    }

    #[test]
    fn test_storage_file_is_trusted() {
        let canonical = canonicalize(
            &raw(json!({
                "id": "c",
                "storageFile": "photo-c.jpg",
                "image": "this is not base64 and is ignored"
            })),
            NOW,
        )
        .unwrap();

        assert_eq!(canonical.record.storage_file.as_deref(), Some("photo-c.jpg"));
        assert_eq!(canonical.image, ImageSource::Stored("photo-c.jpg".to_string()));
    }

    #[test]
    fn test_legacy_inline_image_in_image_url() {
        let canonical = canonicalize(
            &raw(json!({"id": "d", "imageUrl": png_data_url(b"\x89PNG")})),
            NOW,
        )
        .unwrap();

        match canonical.image {
            ImageSource::Inline(image) => {
                assert_eq!(image.mime, "image/png");
                assert_eq!(image.bytes, b"\x89PNG");
                assert_eq!(image.extension(), "png");
            },
            other => panic!("expected inline image, got {other:?}"),
        }
        assert_eq!(canonical.record.storage_file, None);
    }

    #[test]
    fn test_decode_rejects_unsupported_encodings() {
        assert!(decode_inline_image("data:image/png,rawbytes").is_err());
        assert!(decode_inline_image("data:text/plain;base64,aGk=").is_err());
        assert!(decode_inline_image("data:image/png;base64").is_err());
        assert!(decode_inline_image("data:image/png;base64,!!!").is_err());
        assert!(decode_inline_image("data:image/png;base64,").is_err());
    }

    #[test]
    fn test_decode_bare_base64_defaults_to_jpeg() {
        let image = decode_inline_image(&BASE64.encode(b"jpeg")).unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(image.extension(), "jpg");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("IMAGE/PNG"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "jpg");
    }

    #[test]
    fn test_image_file_name_is_deterministic_and_safe() {
        let a = image_file_name("../../etc/passwd", "jpg");
        assert_eq!(a, image_file_name("../../etc/passwd", "jpg"));
        assert_ne!(a, image_file_name("other", "jpg"));
        assert!(a.starts_with("photo-"));
        assert!(a.ends_with(".jpg"));
        assert!(!a.contains('/'));
    }

    #[test]
    fn test_estimated_decoded_len_is_an_upper_bound() {
        let bytes = vec![7u8; 1000];
        let url = png_data_url(&bytes);
        let estimate = estimated_decoded_len(&url);
        assert!(estimate >= 1000);
        assert!(estimate <= 1002);
    }

    #[tokio::test]
    async fn test_normalizer_migrates_inline_image() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::open(tmp.path(), "/uploads").unwrap();
        let normalizer = Normalizer::new(images.clone());

        let entry = raw(json!({"id": "legacy", "caption": "old", "imageUrl": png_data_url(b"png")}));
        let normalized = normalizer.normalize_entry(&entry).await.unwrap();

        assert!(normalized.migrated);
        let name = normalized.record.storage_file.unwrap();
        assert_eq!(name, image_file_name("legacy", "png"));
        assert!(images.exists(&name));
    }

    #[tokio::test]
    async fn test_normalizer_degrades_on_undecodable_image() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::open(tmp.path(), "/uploads").unwrap();
        let normalizer = Normalizer::new(images);

        let entry = raw(json!({"id": "broken", "caption": "kept", "image": "data:image/png;base64,%%%"}));
        let record = normalizer.normalize(&entry).await.unwrap();

        assert_eq!(record.caption, "kept");
        assert_eq!(record.storage_file, None);
    }

    #[tokio::test]
    async fn test_normalizer_degrades_on_write_failure() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::open(tmp.path().join("uploads"), "/uploads").unwrap();
        // Remove the directory so the write fails
        std::fs::remove_dir_all(images.base_dir()).unwrap();
        let normalizer = Normalizer::new(images);

        let entry = raw(json!({"id": "w", "caption": "text", "image": png_data_url(b"png")}));
        let normalized = normalizer.normalize_entry(&entry).await.unwrap();

        assert!(normalized.migrated);
        assert_eq!(normalized.record.caption, "text");
        assert_eq!(normalized.record.storage_file, None);
    }

    #[tokio::test]
    async fn test_normalizer_adopts_legacy_upload_url() {
        let tmp = TempDir::new().unwrap();
        let images = ImageStore::open(tmp.path(), "/uploads").unwrap();
        images.write("photo-old.jpg", b"jpg").unwrap();
        let normalizer = Normalizer::new(images);

        let entry = raw(json!({"id": "u", "imageUrl": "/uploads/photo-old.jpg"}));
        let record = normalizer.normalize(&entry).await.unwrap();
        assert_eq!(record.storage_file.as_deref(), Some("photo-old.jpg"));

        let missing = raw(json!({"id": "m", "imageUrl": "/uploads/gone.jpg"}));
        let record = normalizer.normalize(&missing).await.unwrap();
        assert_eq!(record.storage_file, None);
    }
}

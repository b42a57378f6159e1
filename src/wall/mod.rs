//! Real-time photo wall.
//!
//! Viewers share one bounded, newest-first list of photos. Submissions go
//! through moderation, admission control and validation before the image
//! is written to disk and the record enters the ledger. Every accepted
//! photo and explicit deletion is broadcast to subscribers; evictions are
//! silent.
//!
//! # Components
//!
//! - [`ImageStore`]: image files on disk, addressed by validated names
//! - [`Normalizer`]: raw entries to canonical records, with legacy migration
//! - [`Ledger`]: bounded newest-first collection
//! - [`Persistence`]: debounced, atomic snapshots of the ledger
//! - [`AdmissionController`]: concurrency gate plus payload validation
//! - [`Broadcaster`]: fan-out of wall events
//! - [`PhotoWall`]: the service tying them together
//!
//! # Example
//!
//! ```ignore
//! use photowall::wall::{PhotoWall, WallConfig};
//!
//! let wall = PhotoWall::open(WallConfig::persistent("data")).await?;
//! let mut events = wall.subscribe();
//! let raw = serde_json::from_value(serde_json::json!({"id": "a", "caption": "hi"}))?;
//! wall.submit_photo(raw).await?;
//! wall.shutdown().await?;
//! ```

mod admission;
mod broadcast;
mod images;
mod ledger;
mod moderation;
mod normalize;
mod persistence;
mod service;
mod types;


pub use admission::{AdmissionController, AdmissionPermit};
pub use broadcast::{Broadcaster, WallEvent};
pub use images::ImageStore;
pub use ledger::{Ledger, sanitize};
pub use moderation::{CaptionModerator, ModerationPolicy, Verdict, check_caption};
pub use normalize::{
    Canonical, ImageSource, InlineImage, Normalized, Normalizer, base_record, canonicalize,
    decode_inline_image, estimated_decoded_len, image_file_name,
};
pub use persistence::{Persistence, SnapshotStore};
pub use service::{PhotoWall, PhotoWallBuilder};
pub use types::{PhotoRecord, PublicPhotoView, RawEntry, WallConfig};

//! HTTP API handlers organized by concern.

mod events;
mod photos;
mod system;

pub(crate) use events::event_stream;
pub(crate) use photos::{delete_photo, get_photo, list_photos, submit_photo};
pub(crate) use system::{health, metrics};

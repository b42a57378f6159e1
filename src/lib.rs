//! photowall - a shared, real-time photo wall server.
//!
//! Clients submit photo-and-caption records; the server keeps a bounded,
//! newest-first list, stores images as files, persists the list with
//! debounced snapshots and pushes `photo_created` / `photo_deleted`
//! events to every connected viewer.
//!
//! The core lives in [`wall`]; [`http`] exposes it over axum and
//! [`shutdown`] coordinates a clean stop.

pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod shutdown;
pub mod telemetry;
pub mod wall;

pub use error::{Error, Result};
pub use wall::{PhotoWall, WallConfig};

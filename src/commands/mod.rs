//! CLI command implementations for photowall.
//!
//! - [`serve`] - Run the photo wall HTTP server
//! - [`check_config`] - Validate a configuration file without starting

pub mod check_config;
pub mod serve;

use anyhow::Result;
use std::path::Path;

use crate::config::Config;

/// Loads the config file, falling back to defaults when the default path is absent.
///
/// An explicitly given path must exist.
pub(crate) fn load_config(path: &Path, explicit: bool) -> Result<Config> {
    if explicit {
        Config::load_from(path)
    } else {
        Config::load_or_default(path)
    }
}

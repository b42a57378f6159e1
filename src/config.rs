//! Configuration for the photowall server.
//!
//! Settings are loaded from `photowall.toml`. Every field has a default,
//! so an empty or missing file yields a working development setup:
//!
//! - [`Config`] - Root configuration struct
//! - [`ServerConfig`] - Listen address
//! - [`WallSettings`] - Retention, limits and storage
//! - [`ModerationConfig`] - Caption moderation policy

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::wall::WallConfig;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// photowall.toml configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub wall: WallSettings,
    #[serde(default)]
    pub moderation: ModerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WallSettings {
    /// Holds `photos.json` and the `uploads/` directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Write snapshots; when false the wall forgets everything on restart.
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default = "default_max_photos")]
    pub max_photos: usize,
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

impl Default for WallSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist: true,
            max_photos: default_max_photos(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            max_image_bytes: default_max_image_bytes(),
            save_debounce_ms: default_save_debounce_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Accept captions when the moderator is unreachable.
    #[serde(default = "default_true")]
    pub fail_open: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self { fail_open: true }
    }
}

fn default_host() -> String {
    constants::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_DATA_DIR)
}

fn default_true() -> bool {
    true
}

fn default_max_photos() -> usize {
    constants::DEFAULT_MAX_PHOTOS
}

fn default_max_concurrent_uploads() -> usize {
    constants::DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_max_image_bytes() -> usize {
    constants::DEFAULT_MAX_IMAGE_BYTES
}

fn default_save_debounce_ms() -> u64 {
    constants::DEFAULT_SAVE_DEBOUNCE_MS
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types or are unknown
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Like [`Config::load_from`], but a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Address to bind, e.g. `0.0.0.0:3000`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Runtime view handed to [`crate::wall::PhotoWall::open`].
    pub fn to_wall_config(&self) -> WallConfig {
        let base = if self.wall.persist {
            WallConfig::persistent(&self.wall.data_dir)
        } else {
            WallConfig::in_memory(self.wall.data_dir.join(constants::UPLOADS_DIR_NAME))
        };
        WallConfig {
            max_photos: self.wall.max_photos,
            max_concurrent_uploads: self.wall.max_concurrent_uploads,
            max_image_bytes: self.wall.max_image_bytes,
            save_debounce: Duration::from_millis(self.wall.save_debounce_ms),
            moderation_fail_open: self.moderation.fail_open,
            ..base
        }
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every problem found:
    /// - Port 0 or an empty host
    /// - Zero retention bound, concurrency limit or image size
    /// - A data directory path that is a file
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Server
        if self.server.host.trim().is_empty() {
            errors.push("server.host cannot be empty".to_string());
        }

        if self.server.port == 0 {
            errors.push(
                "Server port cannot be 0. Use a valid port number (1-65535)\n  \
                 Common ports: 3000 (default), 8080, 8000"
                    .to_string(),
            );
        }

        if self.server.port < 1024 && self.server.port > 0 {
            warnings.push(format!(
                "Server port {} is a system/privileged port (< 1024)\n  \
                 Recommendation: Use ports >= 1024 (e.g., 3000, 8080, 8000) to avoid permission issues",
                self.server.port
            ));
        }

        // 2. Wall limits
        let wall = &self.wall;
        if wall.max_photos == 0 {
            errors.push(
                "wall.max_photos cannot be 0. Set a positive number (default: 100)".to_string(),
            );
        }
        if wall.max_photos > 10_000 {
            warnings.push(format!(
                "wall.max_photos {} is very high (> 10000)\n  \
                 Every snapshot rewrites the whole list, so large walls make saves slow",
                wall.max_photos
            ));
        }

        if wall.max_concurrent_uploads == 0 {
            errors.push(
                "wall.max_concurrent_uploads cannot be 0. Every submission would be refused"
                    .to_string(),
            );
        }

        if wall.max_image_bytes == 0 {
            errors.push("wall.max_image_bytes cannot be 0".to_string());
        }
        if wall.max_image_bytes > 50 * 1024 * 1024 {
            warnings.push(format!(
                "wall.max_image_bytes {} is very high (> 50 MiB)\n  \
                 Each in-flight submission holds its decoded image in memory",
                wall.max_image_bytes
            ));
        }

        if wall.persist && wall.save_debounce_ms > 60_000 {
            warnings.push(format!(
                "wall.save_debounce_ms {} is over a minute\n  \
                 A crash can lose everything submitted within that window",
                wall.save_debounce_ms
            ));
        }

        // 3. Storage
        if wall.data_dir.exists() && !wall.data_dir.is_dir() {
            errors.push(format!(
                "wall.data_dir is not a directory: {}",
                wall.data_dir.display()
            ));
        }
        if !wall.persist {
            warnings.push(
                "wall.persist is false: photos are kept in memory only and lost on restart"
                    .to_string(),
            );
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, constants::DEFAULT_PORT);
        assert_eq!(config.wall.max_photos, constants::DEFAULT_MAX_PHOTOS);
        assert!(config.wall.persist);
        assert!(config.moderation.fail_open);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
host = "127.0.0.1"
port = 8080

[wall]
data_dir = "/var/lib/photowall"
max_photos = 50
max_concurrent_uploads = 2
max_image_bytes = 1048576
save_debounce_ms = 250

[moderation]
fail_open = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");

        let wall = config.to_wall_config();
        assert_eq!(wall.max_photos, 50);
        assert_eq!(wall.max_concurrent_uploads, 2);
        assert_eq!(wall.max_image_bytes, 1_048_576);
        assert_eq!(wall.save_debounce, Duration::from_millis(250));
        assert!(!wall.moderation_fail_open);
        assert_eq!(
            wall.snapshot_path,
            Some(PathBuf::from("/var/lib/photowall/photos.json"))
        );
        assert_eq!(wall.uploads_dir, PathBuf::from("/var/lib/photowall/uploads"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[wall]\nmax_photo = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_only_mode() {
        let config: Config = toml::from_str("[wall]\npersist = false\n").unwrap();
        let wall = config.to_wall_config();
        assert!(!wall.persistence_enabled());

        let result = config.validate().unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("memory only")));
    }

    #[test]
    fn test_validate_port_zero() {
        let config: Config = toml::from_str("[server]\nport = 0\n").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("port cannot be 0"));
    }

    #[test]
    fn test_validate_privileged_port_warns() {
        let config: Config = toml::from_str("[server]\nport = 80\n").unwrap();
        let result = config.validate().unwrap();
        assert!(result.has_warnings());
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let toml_str = r#"
[wall]
max_photos = 0
max_concurrent_uploads = 0
max_image_bytes = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_photos cannot be 0"));
        assert!(err.contains("max_concurrent_uploads cannot be 0"));
        assert!(err.contains("max_image_bytes cannot be 0"));
    }

    #[test]
    fn test_validate_data_dir_not_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not-a-dir");
        fs::write(&file_path, b"test").unwrap();

        let config = Config {
            wall: WallSettings {
                data_dir: file_path,
                ..WallSettings::default()
            },
            ..Config::default()
        };

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("not a directory"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("photowall.toml")).unwrap();
        assert_eq!(config.server.port, constants::DEFAULT_PORT);
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photowall.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}

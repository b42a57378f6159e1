//! Validate a configuration file.

use anyhow::Result;
use std::path::Path;

/// Load and validate the config, printing warnings.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or fails validation.
pub fn execute(path: &Path, explicit: bool) -> Result<()> {
    let config = super::load_config(path, explicit)?;
    let result = config.validate()?;

    for warning in &result.warnings {
        println!("Warning: {warning}");
    }

    let wall = config.to_wall_config();
    println!("Configuration OK: {}", path.display());
    println!("  listen:       {}", config.bind_address());
    println!("  max_photos:   {}", wall.max_photos);
    println!("  max_uploads:  {}", wall.max_concurrent_uploads);
    println!("  max_image:    {} bytes", wall.max_image_bytes);
    match &wall.snapshot_path {
        Some(snapshot) => println!(
            "  snapshot:     {} (debounce {} ms)",
            snapshot.display(),
            wall.save_debounce.as_millis()
        ),
        None => println!("  snapshot:     disabled (memory only)"),
    }
    println!("  uploads:      {}", wall.uploads_dir.display());

    Ok(())
}

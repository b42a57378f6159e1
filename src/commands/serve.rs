//! Run the photo wall server.
//!
//! Startup order: logging, config, metrics recorder, wall (restores the
//! snapshot), listener. On SIGINT/SIGTERM the wall stops accepting
//! mutations, event streams close, in-flight requests drain and the
//! pending snapshot is flushed.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::http::{self, AppState};
use crate::shutdown::Shutdown;
use crate::telemetry;
use crate::wall::PhotoWall;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Options for `photowall serve`.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub config_path: PathBuf,
    /// Whether the path was given on the command line.
    pub explicit_config: bool,
    pub port: Option<u16>,
    pub log_format: LogFormat,
}

/// Run the server until a termination signal arrives.
///
/// # Errors
///
/// Returns an error if the config is invalid, the listener cannot bind,
/// or the final snapshot write fails.
pub async fn execute(options: ServeOptions) -> Result<()> {
    init_tracing(options.log_format);

    let mut config = super::load_config(&options.config_path, options.explicit_config)?;
    if let Some(port) = options.port {
        config.server.port = port;
    }
    let validation = config.validate()?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let metrics = match telemetry::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        },
    };

    let wall = PhotoWall::open(config.to_wall_config())
        .await
        .context("Failed to open photo wall")?;
    let shutdown = Shutdown::new(wall.clone());

    let mut state = AppState::new(wall.clone(), shutdown.clone());
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    let app = http::router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;

    info!(
        %address,
        photos = wall.len(),
        max_photos = wall.config().max_photos,
        persistence = wall.persistence_enabled(),
        "Photo wall listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().on_signal())
        .await
        .context("Server error");

    // Flush even if the server failed
    shutdown.finish().await.context("Failed to write final snapshot")?;
    served?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging to stdout.
///
/// `RUST_LOG` overrides the default filter.
fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("photowall=info,wall=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

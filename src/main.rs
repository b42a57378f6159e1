use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use photowall::commands::{self, serve::LogFormat, serve::ServeOptions};
use photowall::constants;

/// Shared real-time photo wall server.
#[derive(Parser, Debug)]
#[command(name = "photowall")]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Config file (default: ./photowall.toml, optional)
        #[arg(short, long, env = "PHOTOWALL_CONFIG")]
        config: Option<PathBuf>,

        /// Override the listen port
        #[arg(short, long, env = "PHOTOWALL_PORT")]
        port: Option<u16>,

        /// Log output format
        #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
        log_format: LogFormat,
    },
    /// Validate a config file and print the effective settings
    CheckConfig {
        /// Config file (default: ./photowall.toml, optional)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn config_path(config: Option<PathBuf>) -> (PathBuf, bool) {
    match config {
        Some(path) => (path, true),
        None => (PathBuf::from(constants::DEFAULT_CONFIG_FILE), false),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            log_format,
        } => {
            let (config_path, explicit_config) = config_path(config);
            commands::serve::execute(ServeOptions {
                config_path,
                explicit_config,
                port,
                log_format,
            })
            .await
        },
        Command::CheckConfig { config } => {
            let (path, explicit) = config_path(config);
            commands::check_config::execute(&path, explicit)
        },
    }
}

//! chunkup command-line entry point.

mod app;
mod config;
mod transport;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::Command;

#[derive(Parser)]
#[command(name = "chunkup", version)]
#[command(about = "Resumable chunked uploads to a file service", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/chunkup/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service root URL
    #[arg(long, global = true, env = "CHUNKUP_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "CHUNKUP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file in chunks
    Upload {
        /// File to upload
        path: PathBuf,

        /// Chunk size in bytes
        #[arg(long)]
        chunk_size: Option<u64>,
    },

    /// List uploaded files
    List,

    /// Show one file's metadata
    Info { id: i64 },

    /// Download a file
    Download {
        id: i64,

        /// Target directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a file
    Delete { id: i64 },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(token) = cli.token {
        config.token = token;
    }

    let command = match cli.command {
        Commands::Upload { path, chunk_size } => {
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            Command::Upload { path }
        }
        Commands::List => Command::List,
        Commands::Info { id } => Command::Info { id },
        Commands::Download { id, out } => Command::Download { id, out },
        Commands::Delete { id } => Command::Delete { id },
    };
    tracing::debug!(base_url = %config.base_url, "configuration resolved");

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(app::run(command, config));
    // A pending stdin read would otherwise hold shutdown open.
    rt.shutdown_background();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload_with_overrides() {
        let cli = Cli::try_parse_from([
            "chunkup",
            "--base-url",
            "http://files:9000",
            "upload",
            "scan.pdf",
            "--chunk-size",
            "1000",
        ])
        .unwrap();
        assert_eq!(cli.base_url.as_deref(), Some("http://files:9000"));
        match cli.command {
            Commands::Upload { path, chunk_size } => {
                assert_eq!(path, PathBuf::from("scan.pdf"));
                assert_eq!(chunk_size, Some(1000));
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn parses_download_out_dir() {
        let cli = Cli::try_parse_from(["chunkup", "download", "7", "--out", "/tmp/x"]).unwrap();
        match cli.command {
            Commands::Download { id, out } => {
                assert_eq!(id, 7);
                assert_eq!(out, Some(PathBuf::from("/tmp/x")));
            }
            _ => panic!("expected download"),
        }
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["chunkup", "delete", "abc"]).is_err());
    }
}

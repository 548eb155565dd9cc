//! `chunkup` command-line uploader.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chunkup_client::ClientConfig;
use chunkup_client::config::DEFAULT_MAX_CONCURRENCY;
use chunkup_protocol::DEFAULT_CHUNK_SIZE;

/// Resumable chunked uploads from the command line.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ClientArgs {
    /// Upload server origin.
    #[arg(long, global = true, default_value = "http://localhost:3001")]
    server: String,

    /// Chunk size in bytes.
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE as u64)]
    chunk_size: u64,

    /// Maximum chunk transfers in flight.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    concurrency: usize,
}

impl From<&ClientArgs> for ClientConfig {
    fn from(args: &ClientArgs) -> Self {
        Self {
            base_url: args.server.clone(),
            chunk_size: args.chunk_size,
            max_concurrency: args.concurrency,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a file, resuming whatever the server already holds.
    Upload {
        path: PathBuf,
        /// Merge on the server once every chunk is uploaded.
        #[arg(long)]
        merge: bool,
        /// Use this fingerprint instead of hashing the file.
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Ask the server to merge an uploaded file.
    Merge {
        path: PathBuf,
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Show what the server holds for a file.
    Verify {
        path: PathBuf,
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Delete a file's server-side state, or everything when no path is given.
    Delete {
        path: Option<PathBuf>,
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Print the fingerprint of a file.
    Fingerprint { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from(&cli.client);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(commands::run(config, cli.command))
}

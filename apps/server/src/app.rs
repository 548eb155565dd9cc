//! Wires the store and the HTTP server together.

use std::sync::Arc;

use chunkup_server::{ServerConfig, UploadServer};
use chunkup_store::{ChunkStore, StorageLayout};

use crate::config::Config;

/// Runs the server until Ctrl-C or until it stops on its own.
pub async fn run(config: Config) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    let layout = StorageLayout::with_prefix(&config.upload_dir, config.staging_prefix.clone());
    let store = ChunkStore::new(layout);

    let server = UploadServer::new(
        ServerConfig {
            listen_addr: config.listen_addr,
            max_body_bytes: config.max_chunk_bytes,
        },
        store,
    );
    let server_run = Arc::clone(&server);
    let mut handle = tokio::spawn(async move { server_run.run().await });

    tokio::select! {
        result = &mut handle => {
            result??;
            return Ok(());
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("SIGINT received, shutting down");
            server.shutdown();
        }
    }

    handle.await??;
    Ok(())
}

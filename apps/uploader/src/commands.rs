//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chunkup_client::{
    ClientConfig, HttpTransport, PipelineOptions, TransferController, TransferEvent, upload_file,
};
use chunkup_transfer::{FingerprintWorker, SourceFile, partition};

use crate::Command;

pub async fn run(config: ClientConfig, command: Command) -> anyhow::Result<()> {
    let transport = HttpTransport::new(&config.base_url)?;
    let mut controller = TransferController::new(transport, config);
    let events = controller
        .take_events()
        .context("event receiver already taken")?;
    let reporter = spawn_reporter(events);

    let result = dispatch(&controller, command).await;

    drop(controller);
    let _ = reporter.await;
    result
}

async fn dispatch(
    controller: &TransferController<HttpTransport>,
    command: Command,
) -> anyhow::Result<()> {
    let chunk_size = controller.config().chunk_size;

    match command {
        Command::Upload {
            path,
            merge,
            fingerprint,
        } => {
            let outcome = upload_file(controller, &path, PipelineOptions { fingerprint, merge })
                .await
                .with_context(|| format!("uploading {}", path.display()))?;

            let Some(report) = outcome.report else {
                println!("{}: already on server ({})", path.display(), outcome.fingerprint());
                return Ok(());
            };
            println!(
                "{}: {} sent, {} resumed, {} failed",
                path.display(),
                report.transferred(),
                report.skipped(),
                report.failed().len()
            );
            if !report.is_complete() {
                for failed in report.failed() {
                    tracing::warn!(chunk_id = %failed.chunk_id, "chunk not uploaded");
                }
                bail!("upload incomplete; run the command again to resume");
            }
            if outcome.merged {
                println!("merged as {}", outcome.source.artifact_name().unwrap_or_default());
            }
        }
        Command::Merge { path, fingerprint } => {
            let (source, fingerprint) = identify(&path, chunk_size, fingerprint).await?;
            controller
                .merge(&fingerprint, &source.name, chunk_size, Some(source.size))
                .await?;
            println!("{}: merged ({fingerprint})", path.display());
        }
        Command::Verify { path, fingerprint } => {
            let (source, fingerprint) = identify(&path, chunk_size, fingerprint).await?;
            let verify = controller.verify(&source.name, &fingerprint).await?;
            if verify.should_upload {
                let total = partition(source.size, chunk_size)?.len();
                println!(
                    "{}: {}/{} chunks on server",
                    path.display(),
                    verify.resumable_chunk_ids.len(),
                    total
                );
            } else {
                println!("{}: complete", path.display());
            }
        }
        Command::Delete { path, fingerprint } => {
            if let Some(path) = path {
                let (source, fingerprint) = identify(&path, chunk_size, fingerprint).await?;
                controller.verify(&source.name, &fingerprint).await?;
            }
            controller.delete().await?;
            println!("deleted");
        }
        Command::Fingerprint { path } => {
            let (_, fingerprint) = identify(&path, chunk_size, None).await?;
            println!("{fingerprint}  {}", path.display());
        }
    }
    Ok(())
}

/// Describes the file at `path` and resolves its fingerprint.
async fn identify(
    path: &Path,
    chunk_size: u64,
    fingerprint: Option<String>,
) -> anyhow::Result<(SourceFile, String)> {
    let source = SourceFile::from_path(path)?;
    let fingerprint = match fingerprint {
        Some(fp) => fp,
        None => {
            let ranges = partition(source.size, chunk_size)?;
            FingerprintWorker::start(path.to_path_buf(), ranges)
                .wait(|percentage| tracing::debug!(percentage, "hashing"))
                .await?
        }
    };
    Ok((source, fingerprint))
}

fn spawn_reporter(mut events: mpsc::Receiver<TransferEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TransferEvent::Fingerprint { percentage } => {
                    tracing::debug!(percentage, "hashing");
                }
                TransferEvent::ChunkProgress { .. } => {}
                TransferEvent::ChunkDone { chunk_id, reply } => {
                    tracing::info!(%chunk_id, %reply, "chunk done");
                }
                TransferEvent::ChunkFailed { chunk_id, error } => {
                    tracing::warn!(%chunk_id, "chunk failed: {error}");
                }
                TransferEvent::Merged { fingerprint } => {
                    tracing::info!(%fingerprint, "merged");
                }
                TransferEvent::Reset => tracing::debug!("reset"),
            }
        }
    })
}

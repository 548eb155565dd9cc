//! Whole-file upload: partition, fingerprint, verify, upload, merge.

use std::path::Path;

use chunkup_transfer::{FingerprintWorker, SourceFile, partition};
use tracing::info;

use crate::controller::TransferController;
use crate::error::ClientError;
use crate::transport::UploadTransport;
use crate::types::{TransferEvent, UploadPlan, UploadReport, VerifyOutcome};

/// Knobs for [`upload_file`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Use this fingerprint instead of hashing the file.
    pub fingerprint: Option<String>,
    /// Merge once every chunk is on the server.
    pub merge: bool,
}

/// What [`upload_file`] did.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub source: SourceFile,
    pub verify: VerifyOutcome,
    /// `None` when the server already had the whole file.
    pub report: Option<UploadReport>,
    pub merged: bool,
}

impl PipelineOutcome {
    /// Fingerprint the file was uploaded under.
    pub fn fingerprint(&self) -> &str {
        self.source.fingerprint().unwrap_or_default()
    }
}

/// Uploads the file at `path` through `controller`.
///
/// Returns early, with no transfers, when the server already holds the
/// merged file. Merging only happens when requested and every chunk made it.
pub async fn upload_file<T: UploadTransport>(
    controller: &TransferController<T>,
    path: &Path,
    options: PipelineOptions,
) -> Result<PipelineOutcome, ClientError> {
    let mut source = SourceFile::from_path(path)?;
    let chunk_size = controller.config().chunk_size;
    let ranges = partition(source.size, chunk_size)?;

    let fingerprint = match options.fingerprint {
        Some(fingerprint) => fingerprint,
        None => {
            FingerprintWorker::start(path.to_path_buf(), ranges.clone())
                .wait(|percentage| controller.emit(TransferEvent::Fingerprint { percentage }))
                .await?
        }
    };
    source.assign_fingerprint(fingerprint.clone())?;
    info!(
        file = %source.name,
        bytes = source.size,
        chunks = ranges.len(),
        %fingerprint,
        "file prepared"
    );

    let verify = controller.verify(&source.name, &fingerprint).await?;
    if !verify.should_upload {
        info!(%fingerprint, "server already has the file");
        return Ok(PipelineOutcome {
            source,
            verify,
            report: None,
            merged: false,
        });
    }

    let plan = UploadPlan {
        path: path.to_path_buf(),
        filename: source.name.clone(),
        fingerprint: fingerprint.clone(),
        ranges,
    };
    let report = controller.upload(&plan, &verify.resumable_chunk_ids).await?;

    let mut merged = false;
    if options.merge && report.is_complete() {
        controller
            .merge(&fingerprint, &source.name, chunk_size, Some(source.size))
            .await?;
        merged = true;
    }

    Ok(PipelineOutcome {
        source,
        verify,
        report: Some(report),
        merged,
    })
}

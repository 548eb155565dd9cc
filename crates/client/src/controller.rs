//! Client-side orchestration of one upload at a time.
//!
//! The controller owns the per-chunk progress records, the set of live
//! transfers and the current upload context. All network I/O goes through
//! an [`UploadTransport`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chunkup_protocol::{DeleteRequest, MergeRequest, VerifyRequest, chunk_id};
use chunkup_transfer::{ChunkProgress, ChunkRange, ChunkReader, ProgressBoard};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{ChunkUpload, ProgressFn, UploadTransport};
use crate::types::{
    ChunkOutcome, ChunkStatus, TransferEvent, UploadContext, UploadPlan, UploadReport,
    VerifyOutcome,
};

/// Event channel capacity. Events beyond it are dropped, never awaited.
const EVENT_BUFFER: usize = 256;

/// In-flight transfers by registration key.
type LiveSet = Arc<Mutex<HashMap<u64, CancellationToken>>>;

/// Drives verify / upload / merge / reset / delete against a transport.
pub struct TransferController<T: UploadTransport> {
    transport: Arc<T>,
    config: ClientConfig,
    progress: Arc<ProgressBoard>,
    live: LiveSet,
    /// Parent of every chunk token issued since the last reset.
    session: Mutex<CancellationToken>,
    next_key: AtomicU64,
    context: Mutex<Option<UploadContext>>,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
}

impl<T: UploadTransport> TransferController<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            transport: Arc::new(transport),
            config,
            progress: Arc::new(ProgressBoard::new()),
            live: Arc::new(Mutex::new(HashMap::new())),
            session: Mutex::new(CancellationToken::new()),
            next_key: AtomicU64::new(0),
            context: Mutex::new(None),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot of the per-chunk progress records.
    pub fn progress(&self) -> Vec<ChunkProgress> {
        self.progress.snapshot()
    }

    /// Size-weighted progress of the current upload.
    pub fn overall_percentage(&self) -> u8 {
        self.progress.overall_percentage()
    }

    /// The file last verified, if any.
    pub fn context(&self) -> Option<UploadContext> {
        self.context.lock().unwrap().clone()
    }

    /// Number of transfers currently in flight.
    pub fn in_flight(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub(crate) fn emit(&self, event: TransferEvent) {
        let _ = self.events_tx.try_send(event);
    }

    /// Asks the server what it already holds for this file and makes it
    /// the current context.
    pub async fn verify(&self, filename: &str, fingerprint: &str) -> Result<VerifyOutcome, ClientError> {
        let resp = self
            .transport
            .verify(VerifyRequest {
                filename: filename.to_string(),
                file_hash: fingerprint.to_string(),
            })
            .await?;

        *self.context.lock().unwrap() = Some(UploadContext {
            fingerprint: fingerprint.to_string(),
            filename: filename.to_string(),
        });

        let outcome = VerifyOutcome {
            should_upload: resp.should_upload,
            resumable_chunk_ids: resp.uploaded_list.unwrap_or_default(),
        };
        debug!(
            %fingerprint,
            should_upload = outcome.should_upload,
            staged = outcome.resumable_chunk_ids.len(),
            "verify"
        );
        Ok(outcome)
    }

    /// Sends every chunk of `plan` not listed in `staged`.
    ///
    /// At most `max_concurrency` transfers run at once. A failed chunk does
    /// not stop the others and is not retried; the report records how each
    /// chunk ended. Chunks cancelled by [`reset`](Self::reset) end as
    /// [`ChunkStatus::Cancelled`].
    pub async fn upload(&self, plan: &UploadPlan, staged: &[String]) -> Result<UploadReport, ClientError> {
        let session = self.session.lock().unwrap().clone();
        self.upload_in_session(plan, staged, session).await
    }

    async fn upload_in_session(
        &self,
        plan: &UploadPlan,
        staged: &[String],
        session: CancellationToken,
    ) -> Result<UploadReport, ClientError> {
        let staged: HashSet<&str> = staged.iter().map(String::as_str).collect();

        let records = plan
            .ranges
            .iter()
            .map(|range| {
                let id = chunk_id(&plan.fingerprint, range.index);
                let percentage = if staged.contains(id.as_str()) { 100 } else { 0 };
                ChunkProgress {
                    chunk_id: id,
                    index: range.index,
                    size: range.len,
                    percentage,
                }
            })
            .collect();
        self.progress.load(records);
        *self.context.lock().unwrap() = Some(UploadContext {
            fingerprint: plan.fingerprint.clone(),
            filename: plan.filename.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut outcomes = Vec::with_capacity(plan.ranges.len());
        let mut tasks = JoinSet::new();

        for range in &plan.ranges {
            let id = chunk_id(&plan.fingerprint, range.index);
            if staged.contains(id.as_str()) {
                outcomes.push(ChunkOutcome {
                    chunk_id: id,
                    index: range.index,
                    status: ChunkStatus::Skipped,
                });
                continue;
            }

            if session.is_cancelled() {
                outcomes.push(ChunkOutcome {
                    chunk_id: id,
                    index: range.index,
                    status: ChunkStatus::Cancelled,
                });
                continue;
            }

            let token = session.child_token();
            let key = self.next_key.fetch_add(1, Ordering::Relaxed);
            self.live.lock().unwrap().insert(key, token.clone());

            let job = ChunkJob {
                transport: Arc::clone(&self.transport),
                semaphore: Arc::clone(&semaphore),
                progress: Arc::clone(&self.progress),
                events: self.events_tx.clone(),
                plan_path: plan.path.clone(),
                range: *range,
                upload: ChunkUpload {
                    fingerprint: plan.fingerprint.clone(),
                    chunk_id: id.clone(),
                    filename: plan.filename.clone(),
                    data: Bytes::new(),
                },
            };
            let live = Arc::clone(&self.live);
            let index = range.index;

            tasks.spawn(async move {
                let status = tokio::select! {
                    biased;
                    _ = token.cancelled() => ChunkStatus::Cancelled,
                    status = job.run() => status,
                };
                live.lock().unwrap().remove(&key);
                ChunkOutcome {
                    chunk_id: id,
                    index,
                    status,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => return Err(ClientError::Join(e.to_string())),
            }
        }
        outcomes.sort_by_key(|o| o.index);

        let report = UploadReport { outcomes };
        info!(
            fingerprint = %plan.fingerprint,
            transferred = report.transferred(),
            skipped = report.skipped(),
            failed = report.failed().len(),
            cancelled = report.cancelled(),
            "upload finished"
        );
        Ok(report)
    }

    /// Asks the server to assemble the staged chunks.
    ///
    /// `file_size`, when given, lets the server refuse an incomplete set.
    pub async fn merge(
        &self,
        fingerprint: &str,
        filename: &str,
        chunk_size: u64,
        file_size: Option<u64>,
    ) -> Result<(), ClientError> {
        let reply = self
            .transport
            .merge(MergeRequest {
                size: chunk_size,
                file_hash: fingerprint.to_string(),
                filename: filename.to_string(),
                file_size,
            })
            .await?;
        if !reply.is_ok() {
            return Err(ClientError::Server {
                code: reply.code,
                message: reply.message,
            });
        }
        info!(%fingerprint, %filename, "merged");
        self.emit(TransferEvent::Merged {
            fingerprint: fingerprint.to_string(),
        });
        Ok(())
    }

    /// Cancels every in-flight transfer and clears progress and context.
    pub fn reset(&self) {
        let session = std::mem::take(&mut *self.session.lock().unwrap());
        session.cancel();
        let cancelled: Vec<CancellationToken> =
            self.live.lock().unwrap().drain().map(|(_, t)| t).collect();
        self.progress.clear();
        *self.context.lock().unwrap() = None;
        if !cancelled.is_empty() {
            info!(cancelled = cancelled.len(), "transfers cancelled");
        }
        self.emit(TransferEvent::Reset);
    }

    /// Purges server-side state of the current file, or of everything when
    /// no file was verified, then resets.
    ///
    /// In-flight transfers are cancelled before the request goes out so they
    /// cannot stage chunks again behind the purge.
    pub async fn delete(&self) -> Result<(), ClientError> {
        let req = self.context().map(|ctx| DeleteRequest {
            file_hash: ctx.fingerprint,
            filename: ctx.filename,
        });
        self.reset();

        let reply = self.transport.delete(req).await?;
        if !reply.is_ok() {
            return Err(ClientError::Server {
                code: reply.code,
                message: reply.message,
            });
        }
        Ok(())
    }
}

/// One chunk transfer, run inside its own task.
struct ChunkJob<T: UploadTransport> {
    transport: Arc<T>,
    semaphore: Arc<Semaphore>,
    progress: Arc<ProgressBoard>,
    events: mpsc::Sender<TransferEvent>,
    plan_path: std::path::PathBuf,
    range: ChunkRange,
    upload: ChunkUpload,
}

impl<T: UploadTransport> ChunkJob<T> {
    async fn run(mut self) -> ChunkStatus {
        let chunk_id = self.upload.chunk_id.clone();
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return ChunkStatus::Cancelled,
        };

        let path = self.plan_path.clone();
        let range = self.range;
        let data = tokio::task::spawn_blocking(move || {
            ChunkReader::open(&path).and_then(|mut reader| reader.read_range(&range))
        })
        .await;
        self.upload.data = match data {
            Ok(Ok(bytes)) => Bytes::from(bytes),
            Ok(Err(e)) => return self.failed(e.to_string()),
            Err(e) => return self.failed(format!("task join error: {e}")),
        };

        let progress: ProgressFn = {
            let board = Arc::clone(&self.progress);
            let events = self.events.clone();
            let chunk_id = chunk_id.clone();
            Arc::new(move |percentage| {
                board.set_percentage(&chunk_id, percentage);
                let _ = events.try_send(TransferEvent::ChunkProgress {
                    chunk_id: chunk_id.clone(),
                    percentage,
                });
            })
        };

        match self.transport.send_chunk(self.upload.clone(), progress).await {
            Ok(reply) => {
                self.progress.set_percentage(&chunk_id, 100);
                let _ = self.events.try_send(TransferEvent::ChunkDone {
                    chunk_id,
                    reply,
                });
                ChunkStatus::Sent(reply)
            }
            Err(e) => self.failed(e.to_string()),
        }
    }

    fn failed(&self, error: String) -> ChunkStatus {
        warn!(chunk_id = %self.upload.chunk_id, "chunk transfer failed: {error}");
        let _ = self.events.try_send(TransferEvent::ChunkFailed {
            chunk_id: self.upload.chunk_id.clone(),
            error: error.clone(),
        });
        ChunkStatus::Failed(error)
    }
}

//! Route handlers.

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chunkup_protocol::{
    CHUNK_FAILED, ChunkReply, DELETE_SUCCESS, DeleteRequest, ErrorKind, MERGE_SUCCESS,
    MergeRequest, StatusResponse, VerifyRequest, VerifyResponse, fields, routes,
};
use chunkup_store::{
    ChunkStore, IncomingChunk, MergeEngine, ReceiveOutcome, VerificationService, VerifyDecision,
};

use crate::error::{ApiError, status_for};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    store: ChunkStore,
    verifier: VerificationService,
    merger: MergeEngine,
}

impl AppState {
    pub fn new(store: ChunkStore) -> Self {
        Self {
            verifier: store.verifier(),
            merger: store.merger(),
            store,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }
}

/// Builds the upload router.
///
/// `max_body_bytes` bounds each request body, chunk uploads included.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(routes::UPLOAD_CHUNK, post(upload_chunk))
        .route(routes::VERIFY, post(verify))
        .route(routes::MERGE, post(merge))
        .route(routes::DELETE, get(delete).post(delete))
        .route(routes::HEALTH, get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::input(format!("invalid JSON body: {e}")))
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok("ok"))
}

async fn verify(State(state): State<AppState>, body: Bytes) -> Result<Json<VerifyResponse>, ApiError> {
    let req: VerifyRequest = parse_json(&body)?;
    let decision = state.verifier.verify(&req.file_hash, &req.filename).await?;
    let response = match decision {
        VerifyDecision::Complete => VerifyResponse::complete(),
        VerifyDecision::Upload { uploaded } => VerifyResponse::upload(uploaded),
    };
    Ok(Json(response))
}

async fn merge(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusResponse>, ApiError> {
    let req: MergeRequest = parse_json(&body)?;
    let outcome = state
        .merger
        .merge(&req.file_hash, &req.filename, req.size, req.file_size)
        .await?;
    info!(
        fingerprint = %req.file_hash,
        bytes = outcome.bytes,
        already_merged = outcome.already_merged,
        "merge request served"
    );
    Ok(Json(StatusResponse::ok(MERGE_SUCCESS)))
}

async fn delete(State(state): State<AppState>, body: Bytes) -> Result<Json<StatusResponse>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        let removed = state.store.purge_all().await?;
        info!(removed, "delete request purged all uploads");
    } else {
        let req: DeleteRequest = parse_json(&body)?;
        state.store.purge(&req.file_hash, &req.filename).await?;
    }
    Ok(Json(StatusResponse::ok(DELETE_SUCCESS)))
}

/// Metadata fields of a chunk upload.
#[derive(Default)]
struct ChunkFields {
    hash: Option<String>,
    filename: Option<String>,
    file_hash: Option<String>,
    length: Option<String>,
}

async fn upload_chunk(State(state): State<AppState>, multipart: Multipart) -> Response {
    match receive_chunk(&state.store, multipart).await {
        Ok(reply) => reply.as_str().into_response(),
        Err(e) => {
            warn!(kind = ?e.kind, "chunk rejected: {}", e.message);
            (status_for(e.kind), CHUNK_FAILED).into_response()
        }
    }
}

async fn receive_chunk(store: &ChunkStore, mut multipart: Multipart) -> Result<ChunkReply, ApiError> {
    let mut meta = ChunkFields::default();
    let mut body: Option<IncomingChunk> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            fields::CHUNK => {
                let mut incoming = store.incoming().await?;
                while let Some(bytes) = field.chunk().await.map_err(malformed)? {
                    incoming.write(&bytes).await?;
                }
                body = Some(incoming);
            }
            fields::HASH => meta.hash = Some(field.text().await.map_err(malformed)?),
            fields::FILENAME => meta.filename = Some(field.text().await.map_err(malformed)?),
            fields::FILE_HASH => meta.file_hash = Some(field.text().await.map_err(malformed)?),
            fields::LENGTH => meta.length = Some(field.text().await.map_err(malformed)?),
            _ => {}
        }
    }

    let incoming = body.ok_or_else(|| missing(fields::CHUNK))?;
    let chunk_id = meta.hash.ok_or_else(|| missing(fields::HASH))?;
    let filename = meta.filename.ok_or_else(|| missing(fields::FILENAME))?;
    let fingerprint = meta.file_hash.ok_or_else(|| missing(fields::FILE_HASH))?;

    if let Some(length) = meta.length {
        let declared: u64 = length
            .trim()
            .parse()
            .map_err(|_| ApiError::input(format!("invalid length: {length}")))?;
        if declared != incoming.len() {
            return Err(ApiError::input(format!(
                "declared length {declared} but received {} bytes",
                incoming.len()
            )));
        }
    }

    let outcome = store.receive(&fingerprint, &chunk_id, incoming, &filename).await?;
    Ok(match outcome {
        ReceiveOutcome::Received => ChunkReply::Received,
        ReceiveOutcome::ChunkExists => ChunkReply::ChunkExists,
        ReceiveOutcome::FileExists => ChunkReply::FileExists,
    })
}

fn malformed(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::new(ErrorKind::Input, format!("malformed multipart body: {e}"))
}

fn missing(field: &str) -> ApiError {
    ApiError::input(format!("missing field: {field}"))
}

//! HTTP transport over reqwest.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use chunkup_protocol::{
    ChunkReply, DeleteRequest, MergeRequest, StatusResponse, VerifyRequest, VerifyResponse,
    fields, routes,
};

use crate::error::ClientError;
use crate::transport::{ChunkUpload, ProgressFn, TransportFuture, UploadTransport};

/// Granularity of chunk body progress reports.
const BODY_SLICE: usize = 64 * 1024;

/// [`UploadTransport`] speaking the upload server's HTTP protocol.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url` (`http://host:port`).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Self::with_client(http, base_url)
    }

    /// Uses a preconfigured reqwest client.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        body: Option<&B>,
    ) -> Result<R, ClientError> {
        let mut req = self.http.post(self.url(route));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &bytes));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Prefers the `{code, message}` body when the server sent one.
fn error_from_body(status: u16, body: &[u8]) -> ClientError {
    if let Ok(reply) = serde_json::from_slice::<StatusResponse>(body)
        && !reply.is_ok()
    {
        return ClientError::Server {
            code: reply.code,
            message: reply.message,
        };
    }
    ClientError::Api {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

/// Splits a chunk body into slices so its transfer can be observed.
fn body_slices(data: &Bytes) -> Vec<Bytes> {
    (0..data.len())
        .step_by(BODY_SLICE)
        .map(|start| data.slice(start..(start + BODY_SLICE).min(data.len())))
        .collect()
}

fn chunk_part(data: Bytes, progress: ProgressFn) -> Part {
    let total = data.len() as u64;
    if total == 0 {
        progress(100);
    }
    let mut sent = 0u64;
    let stream = futures_util::stream::iter(body_slices(&data)).map(move |slice| {
        sent += slice.len() as u64;
        progress((sent * 100 / total) as u8);
        Ok::<Bytes, std::io::Error>(slice)
    });
    Part::stream_with_length(reqwest::Body::wrap_stream(stream), total).file_name("blob")
}

impl UploadTransport for HttpTransport {
    fn verify(&self, req: VerifyRequest) -> TransportFuture<'_, VerifyResponse> {
        Box::pin(async move { self.post_json(routes::VERIFY, Some(&req)).await })
    }

    fn send_chunk(&self, chunk: ChunkUpload, progress: ProgressFn) -> TransportFuture<'_, ChunkReply> {
        Box::pin(async move {
            let len = chunk.data.len();
            let form = Form::new()
                .part(fields::CHUNK, chunk_part(chunk.data, progress))
                .text(fields::HASH, chunk.chunk_id.clone())
                .text(fields::FILENAME, chunk.filename)
                .text(fields::FILE_HASH, chunk.fingerprint)
                .text(fields::LENGTH, len.to_string());

            let resp = self
                .http
                .post(self.url(routes::UPLOAD_CHUNK))
                .multipart(form)
                .send()
                .await?;
            let status = resp.status();
            let body = resp.text().await?;

            if !status.is_success() {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    body,
                });
            }
            let reply = ChunkReply::parse(&body)
                .ok_or_else(|| ClientError::Protocol(format!("unexpected chunk reply: {body:?}")))?;
            debug!(chunk_id = %chunk.chunk_id, bytes = len, %reply, "chunk sent");
            Ok(reply)
        })
    }

    fn merge(&self, req: MergeRequest) -> TransportFuture<'_, StatusResponse> {
        Box::pin(async move { self.post_json(routes::MERGE, Some(&req)).await })
    }

    fn delete(&self, req: Option<DeleteRequest>) -> TransportFuture<'_, StatusResponse> {
        Box::pin(async move { self.post_json(routes::DELETE, req.as_ref()).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let transport = HttpTransport::new("http://localhost:3001/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:3001");
        assert_eq!(transport.url(routes::UPLOAD_CHUNK), "http://localhost:3001/");
        assert_eq!(transport.url(routes::MERGE), "http://localhost:3001/merge");
    }

    #[test]
    fn non_http_url_is_rejected() {
        assert!(matches!(
            HttpTransport::new("ftp://example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn slices_cover_body() {
        let data = Bytes::from(vec![7u8; BODY_SLICE * 2 + 10]);
        let slices = body_slices(&data);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[2].len(), 10);
        assert_eq!(slices.iter().map(Bytes::len).sum::<usize>(), data.len());
        assert!(body_slices(&Bytes::new()).is_empty());
    }

    #[test]
    fn error_body_prefers_status_json() {
        let err = error_from_body(422, br#"{"code":4,"message":"incomplete upload"}"#);
        assert!(matches!(err, ClientError::Server { code: 4, .. }));

        let err = error_from_body(500, b"process file chunk failed");
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
    }
}

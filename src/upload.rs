//! HTTP delivery of a finished multipart body.
//!
//! The body is sent as a single POST with explicit `Content-Type` and
//! `Content-Length` headers. Reading happens on a blocking task that feeds
//! [`CHUNK_SIZE`] chunks through a bounded channel, so at most a few chunks
//! of the report are held in memory at once.
//!
//! ```text
//! BodyStream --(spawn_blocking, read)--> mpsc --(wrap_stream)--> reqwest
//! ```
//!
//! There is no retry: a failed upload is reported to the caller.

use std::io::{self, Read};

use futures_util::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::multipart::{BodyStream, MultipartBody, MultipartError, CHUNK_SIZE};

/// Chunks buffered between the reader task and the HTTP client.
const CHANNEL_DEPTH: usize = 8;

/// Upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read report body: {0}")]
    Body(#[source] io::Error),

    #[error("Body reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Server rejected report: {0}")]
    Status(StatusCode),
}

/// Sends crash report bodies to one endpoint.
#[derive(Debug, Clone)]
pub struct Uploader {
    client: Client,
    endpoint: String,
}

impl Uploader {
    /// Creates an uploader with a default [`reqwest::Client`].
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates an uploader that reuses an existing client.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// URL reports are POSTed to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POSTs `body` and returns the response status.
    ///
    /// The body must be finished; it is consumed by the upload. A read
    /// error while streaming aborts the request and is returned as
    /// [`UploadError::Body`]. Non-2xx responses become [`UploadError::Status`].
    pub async fn upload(&self, body: &mut MultipartBody) -> Result<StatusCode, UploadError> {
        let content_type = body.content_type();
        let content_length = body.content_length();
        let reader = body.open_stream()?;

        let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(CHANNEL_DEPTH);
        let pump = tokio::task::spawn_blocking(move || pump_body(reader, tx));

        let chunks = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        tracing::debug!(endpoint = %self.endpoint, content_length, "sending crash report");
        let sent = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(chunks))
            .send()
            .await;

        let pumped = pump.await?;
        let response = match (sent, pumped) {
            (_, Err(e)) => return Err(UploadError::Body(e)),
            (Err(e), Ok(_)) => return Err(UploadError::Http(e)),
            (Ok(response), Ok(_)) => response,
        };

        let status = response.status();
        tracing::info!(code = status.as_u16(), "request complete");
        if !status.is_success() {
            return Err(UploadError::Status(status));
        }
        Ok(status)
    }
}

/// Reads the body on a blocking thread and forwards it chunk by chunk.
///
/// Stops quietly if the receiver is gone; the request outcome reports why.
fn pump_body(mut reader: BodyStream, tx: mpsc::Sender<io::Result<Vec<u8>>>) -> io::Result<u64> {
    let mut sent = 0u64;
    loop {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(sent),
            Ok(n) => {
                chunk.truncate(n);
                if tx.blocking_send(Ok(chunk)).is_err() {
                    return Ok(sent);
                }
                sent += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::error!(error = %e, sent, "failed to read report body");
                let _ = tx.blocking_send(Err(io::Error::new(e.kind(), e.to_string())));
                return Err(e);
            }
        }
    }
}

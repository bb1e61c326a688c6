//! Remote face recognition over HTTP.
//!
//! `POST <base>/face-recognition` with `{ image, faceData }` and expect
//! `{ recognized, name? }` back. Any non-2xx status fails the attempt.

use crate::types::FaceDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use reqwest::{StatusCode, Url};

/// Path of the recognition endpoint relative to the configured base URL.
pub const RECOGNITION_PATH: &str = "face-recognition";

/// Upper bound on extra attempts after a transport failure.
pub const MAX_RETRIES: u32 = 3;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("invalid recognition endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("recognition service returned HTTP {0}")]
    Status(StatusCode),
    #[error("recognition request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed recognition response: {0}")]
    InvalidResponse(String),
}

impl RecognitionError {
    /// Network-level failures, as opposed to a reply we could not understand.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            RecognitionError::Status(_) | RecognitionError::Timeout | RecognitionError::Transport(_)
        )
    }

    /// Failures worth another attempt: the request may never have arrived.
    fn is_transient(&self) -> bool {
        matches!(self, RecognitionError::Timeout | RecognitionError::Transport(_))
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RecognitionError::Timeout
        } else if e.is_decode() {
            RecognitionError::InvalidResponse(e.to_string())
        } else {
            RecognitionError::Transport(e.to_string())
        }
    }
}

/// Request body sent to the recognition service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionRequest {
    /// Base64-encoded image.
    pub image: String,
    /// Detector output for the faces found in `image`.
    #[serde(rename = "faceData")]
    pub face_data: Vec<FaceDescriptor>,
}

/// Reply from the recognition service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResponse {
    pub recognized: bool,
    #[serde(default)]
    pub name: Option<String>,
}

/// Remote identity matching.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError>;
}

/// Tuning for [`HttpRecognitionClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whole-request timeout, connect through body.
    pub timeout: Duration,
    /// Extra attempts after a timeout or transport failure. HTTP status
    /// failures are never retried. Clamped to [`MAX_RETRIES`].
    pub retries: u32,
    /// Accept self-signed certificates (development servers only).
    pub accept_invalid_certs: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 0,
            accept_invalid_certs: false,
        }
    }
}

/// [`RecognitionService`] backed by an HTTP JSON endpoint.
pub struct HttpRecognitionClient {
    client: reqwest::Client,
    endpoint: Url,
    retries: u32,
}

impl HttpRecognitionClient {
    pub fn new(base_url: &Url, options: ClientOptions) -> Result<Self, RecognitionError> {
        let endpoint = endpoint_for(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .build()
            .map_err(|e| RecognitionError::Transport(format!("failed to build client: {e}")))?;

        if options.accept_invalid_certs {
            tracing::warn!(%endpoint, "TLS certificate validation disabled");
        }

        Ok(Self {
            client,
            endpoint,
            retries: options.retries.min(MAX_RETRIES),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_once(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        let response = self.client.post(self.endpoint.clone()).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Status(status));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RecognitionError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionClient {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            image_bytes = request.image.len(),
            faces = request.face_data.len(),
            "submitting recognition request"
        );

        let mut attempt = 0;
        loop {
            match self.post_once(request).await {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "recognition request failed; retrying");
                }
                result => return result,
            }
        }
    }
}

/// Append the recognition path to a base URL, keeping any path prefix
/// (`http://host/api` becomes `http://host/api/face-recognition`).
fn endpoint_for(base: &Url) -> Result<Url, RecognitionError> {
    if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
        return Err(RecognitionError::InvalidEndpoint(base.to_string()));
    }
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(RECOGNITION_PATH)
        .map_err(|e| RecognitionError::InvalidEndpoint(format!("{base}: {e}")))
}

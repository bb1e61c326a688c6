//! Camera collaborator contract.

use crate::photo::CapturedImage;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("preview is not streaming")]
    NotStreaming,
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Answer from the platform when asked for camera authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Which sensor the preview session binds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Front,
    Back,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => f.write_str("front"),
            Facing::Back => f.write_str("back"),
        }
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(Facing::Front),
            "back" => Ok(Facing::Back),
            other => Err(format!("unknown camera facing {other:?} (expected front or back)")),
        }
    }
}

/// Per-capture options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Also produce a base64 encoding of the image for transport.
    pub base64: bool,
}

/// A camera device as seen by the capture session.
///
/// Implementations are only ever driven by [`CaptureController`](crate::CaptureController),
/// which owns the device for the lifetime of the mounted view.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Ask the platform for camera authorization.
    async fn request_permission(&self) -> PermissionStatus;

    /// Start the preview stream on the given sensor. Resolves once the
    /// stream is live.
    async fn open_preview(&self, facing: Facing) -> Result<(), CameraError>;

    /// Acquire one still image from the live preview.
    async fn take_picture(&self, options: CaptureOptions) -> Result<CapturedImage, CameraError>;

    /// Tear the preview stream down. Idempotent.
    async fn close_preview(&self);
}

use ponto_core::{DetectorError, RecognitionError};
use ponto_hw::CaptureError;
use thiserror::Error;

/// Everything that can stop a clock-in attempt.
#[derive(Error, Debug)]
pub enum ClockInError {
    /// Terminal for the session: the platform refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// Transient: the camera is not streaming yet.
    #[error("camera is not ready")]
    NotReady,
    /// Transient: another attempt is in flight.
    #[error("a recognition attempt is already in progress")]
    Busy,
    /// Informational: the photo had no face, so nothing was submitted.
    #[error("no face detected")]
    NoFaceDetected,
    #[error("communication with the recognition service failed: {0}")]
    Communication(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
    /// The screen was left while the attempt was running.
    #[error("attempt cancelled")]
    Cancelled,
}

impl From<CaptureError> for ClockInError {
    fn from(e: CaptureError) -> Self {
        match e {
            CaptureError::PermissionDenied => ClockInError::PermissionDenied,
            CaptureError::NotReady => ClockInError::NotReady,
            CaptureError::Busy => ClockInError::Busy,
            CaptureError::Unmounted => ClockInError::Cancelled,
            CaptureError::Camera(e) => ClockInError::Unexpected(format!("camera: {e}")),
        }
    }
}

impl From<DetectorError> for ClockInError {
    fn from(e: DetectorError) -> Self {
        ClockInError::Unexpected(format!("face detection: {e}"))
    }
}

impl From<RecognitionError> for ClockInError {
    fn from(e: RecognitionError) -> Self {
        if e.is_communication() {
            ClockInError::Communication(e.to_string())
        } else {
            ClockInError::Unexpected(e.to_string())
        }
    }
}

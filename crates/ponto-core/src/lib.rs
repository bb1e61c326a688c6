//! ponto-core — Face detection and remote recognition.
//!
//! Detection runs locally (SCRFD via ONNX Runtime) and only decides whether
//! a face is present and where; matching against known identities is left
//! to the remote recognition service.

pub mod detector;
pub mod recognizer;
pub mod types;

pub use detector::{DetectorError, FaceDetector, ScrfdDetector};
pub use recognizer::{
    ClientOptions, HttpRecognitionClient, RecognitionError, RecognitionRequest,
    RecognitionResponse, RecognitionService, StatusCode, Url,
};
pub use types::{DetectionOptions, DetectionResult, FaceDescriptor};

use std::path::PathBuf;

/// Default directory for ONNX model files: `$XDG_DATA_HOME/ponto/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("ponto")
        .join("models")
}

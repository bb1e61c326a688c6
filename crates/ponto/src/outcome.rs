use crate::error::ClockInError;
use ponto_core::RecognitionResponse;

pub const NO_FACE_MESSAGE: &str = "No face detected. Please try again.";
pub const NOT_RECOGNIZED_MESSAGE: &str = "Face not recognized.";
pub const ERROR_MESSAGE: &str = "An error occurred during recognition.";
pub const NO_CAMERA_ACCESS_MESSAGE: &str = "No camera access.";
/// Shown when the service recognizes a face but sends no name.
pub const UNNAMED_USER: &str = "User";

/// Why an attempt ended without an identity. Kept distinct so the user can
/// tell "retake the photo" apart from "you are not enrolled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotRecognizedReason {
    NoFace,
    Unmatched,
}

/// Result of one recognition attempt; drives the single status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    Recognized { name: String },
    NotRecognized(NotRecognizedReason),
    Error { message: String },
}

impl RecognitionOutcome {
    pub fn message(&self) -> String {
        match self {
            RecognitionOutcome::Recognized { name } => format!("Face recognized: {name}"),
            RecognitionOutcome::NotRecognized(NotRecognizedReason::NoFace) => NO_FACE_MESSAGE.to_string(),
            RecognitionOutcome::NotRecognized(NotRecognizedReason::Unmatched) => {
                NOT_RECOGNIZED_MESSAGE.to_string()
            }
            RecognitionOutcome::Error { message } => message.clone(),
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, RecognitionOutcome::Recognized { .. })
    }

    /// Outcome for a pipeline failure. Details stay in the logs; the user
    /// only sees the generic message.
    pub fn from_error(error: &ClockInError) -> Self {
        match error {
            ClockInError::NoFaceDetected => {
                RecognitionOutcome::NotRecognized(NotRecognizedReason::NoFace)
            }
            _ => RecognitionOutcome::Error {
                message: ERROR_MESSAGE.to_string(),
            },
        }
    }
}

impl From<RecognitionResponse> for RecognitionOutcome {
    fn from(response: RecognitionResponse) -> Self {
        if !response.recognized {
            return RecognitionOutcome::NotRecognized(NotRecognizedReason::Unmatched);
        }
        let name = response
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNNAMED_USER.to_string());
        RecognitionOutcome::Recognized { name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_message_contains_name() {
        let outcome = RecognitionOutcome::from(RecognitionResponse {
            recognized: true,
            name: Some("Jane Doe".into()),
        });
        assert_eq!(outcome, RecognitionOutcome::Recognized { name: "Jane Doe".into() });
        assert!(outcome.message().contains("Jane Doe"));
    }

    #[test]
    fn test_missing_or_blank_name_falls_back() {
        for name in [None, Some(String::new()), Some("  ".to_string())] {
            let outcome = RecognitionOutcome::from(RecognitionResponse { recognized: true, name });
            assert_eq!(outcome.message(), "Face recognized: User");
        }
    }

    #[test]
    fn test_no_face_and_unmatched_are_distinct() {
        let no_face = RecognitionOutcome::from_error(&ClockInError::NoFaceDetected);
        let unmatched = RecognitionOutcome::from(RecognitionResponse { recognized: false, name: None });
        assert_eq!(no_face, RecognitionOutcome::NotRecognized(NotRecognizedReason::NoFace));
        assert_eq!(unmatched, RecognitionOutcome::NotRecognized(NotRecognizedReason::Unmatched));
        assert_ne!(no_face.message(), unmatched.message());
    }

    #[test]
    fn test_errors_share_generic_message() {
        for error in [
            ClockInError::Communication("HTTP 500".into()),
            ClockInError::Unexpected("decoder".into()),
        ] {
            assert_eq!(RecognitionOutcome::from_error(&error).message(), ERROR_MESSAGE);
        }
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn midpoint(self, other: Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned face bounds in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub origin: Point,
    pub size: Size,
}

/// One detected face, serialized in the shape the recognition service
/// expects under `faceData`. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDescriptor {
    #[serde(rename = "faceID", default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<u32>,
    pub bounds: Bounds,
    /// Detector score in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Head tilt in degrees, positive clockwise in image space.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_angle: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw_angle: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nose_base_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_mouth_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_mouth_position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_position: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smiling_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye_open_probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye_open_probability: Option<f32>,
}

impl FaceDescriptor {
    /// A descriptor carrying only bounds.
    pub fn with_bounds(bounds: Bounds) -> Self {
        Self {
            face_id: None,
            bounds,
            confidence: None,
            roll_angle: None,
            yaw_angle: None,
            left_eye_position: None,
            right_eye_position: None,
            nose_base_position: None,
            left_mouth_position: None,
            right_mouth_position: None,
            mouth_position: None,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
        }
    }

    pub fn has_landmarks(&self) -> bool {
        self.left_eye_position.is_some()
            || self.right_eye_position.is_some()
            || self.nose_base_position.is_some()
            || self.left_mouth_position.is_some()
            || self.right_mouth_position.is_some()
            || self.mouth_position.is_some()
    }

    fn clear_landmarks(&mut self) {
        self.left_eye_position = None;
        self.right_eye_position = None;
        self.nose_base_position = None;
        self.left_mouth_position = None;
        self.right_mouth_position = None;
        self.mouth_position = None;
    }

    fn clear_classifications(&mut self) {
        self.smiling_probability = None;
        self.left_eye_open_probability = None;
        self.right_eye_open_probability = None;
    }
}

/// Speed/accuracy trade-off for the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectionMode {
    #[default]
    Fast,
    Accurate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LandmarkMode {
    #[default]
    None,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassificationMode {
    #[default]
    None,
    All,
}

/// What the detector should compute for each face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionOptions {
    pub mode: DetectionMode,
    pub landmarks: LandmarkMode,
    pub classifications: ClassificationMode,
}

impl DetectionOptions {
    /// Configuration used for every clock-in attempt: fast mode with full
    /// landmark and classification output.
    pub const fn clock_in() -> Self {
        Self {
            mode: DetectionMode::Fast,
            landmarks: LandmarkMode::All,
            classifications: ClassificationMode::All,
        }
    }

    /// Drop the parts of a descriptor these options did not ask for.
    pub fn restrict(&self, face: &mut FaceDescriptor) {
        if self.landmarks == LandmarkMode::None {
            face.clear_landmarks();
        }
        if self.classifications == ClassificationMode::None {
            face.clear_classifications();
        }
    }
}

/// Output of one detection call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub faces: Vec<FaceDescriptor>,
}

impl DetectionResult {
    pub fn new(faces: Vec<FaceDescriptor>) -> Self {
        Self { faces }
    }

    pub fn face_present(&self) -> bool {
        !self.faces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

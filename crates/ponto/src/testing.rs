//! Scripted collaborators shared by the unit tests.

use async_trait::async_trait;
use ponto_core::types::{Bounds, Point, Size};
use ponto_core::{
    DetectionOptions, DetectionResult, DetectorError, FaceDescriptor, FaceDetector,
    RecognitionError, RecognitionRequest, RecognitionResponse, RecognitionService, StatusCode,
};
use ponto_hw::{
    Camera, CameraError, CaptureOptions, CapturedImage, Facing, PermissionStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub(crate) fn photo() -> CapturedImage {
    CapturedImage::new(b"jpeg bytes".to_vec(), 640, 480)
}

pub(crate) fn face(id: u32) -> FaceDescriptor {
    let mut face = FaceDescriptor::with_bounds(Bounds {
        origin: Point { x: 100.0, y: 80.0 },
        size: Size { width: 200.0, height: 260.0 },
    });
    face.face_id = Some(id);
    face.left_eye_position = Some(Point { x: 160.0, y: 160.0 });
    face.right_eye_position = Some(Point { x: 240.0, y: 160.0 });
    face
}

pub(crate) struct FakeDetector {
    faces: usize,
    fail: bool,
    calls: AtomicUsize,
    pub seen_options: Mutex<Option<DetectionOptions>>,
}

impl FakeDetector {
    pub fn with_faces(faces: usize) -> Self {
        Self {
            faces,
            fail: false,
            calls: AtomicUsize::new(0),
            seen_options: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_faces(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector for FakeDetector {
    async fn detect(
        &self,
        _image: &CapturedImage,
        options: &DetectionOptions,
    ) -> Result<DetectionResult, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_options.lock().unwrap() = Some(*options);
        if self.fail {
            return Err(DetectorError::InvalidImage("corrupt jpeg".into()));
        }
        Ok(DetectionResult::new((0..self.faces as u32).map(face).collect()))
    }
}

type Reply = Box<dyn Fn() -> Result<RecognitionResponse, RecognitionError> + Send + Sync>;

pub(crate) struct FakeService {
    reply: Reply,
    calls: AtomicUsize,
    /// When set, each call waits for one notification before replying.
    pub gate: Option<Notify>,
    delay: Option<Duration>,
    pub requests: Mutex<Vec<RecognitionRequest>>,
}

impl FakeService {
    fn replying(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            gate: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn recognizing(name: &str) -> Self {
        let name = name.to_string();
        Self::replying(Box::new(move || {
            Ok(RecognitionResponse {
                recognized: true,
                name: Some(name.clone()),
            })
        }))
    }

    pub fn unmatched() -> Self {
        Self::replying(Box::new(|| {
            Ok(RecognitionResponse {
                recognized: false,
                name: None,
            })
        }))
    }

    pub fn status(code: u16) -> Self {
        Self::replying(Box::new(move || {
            Err(RecognitionError::Status(
                StatusCode::from_u16(code).unwrap(),
            ))
        }))
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl RecognitionService for FakeService {
    async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResponse, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.reply)()
    }
}

pub(crate) struct FakeCamera {
    permission: PermissionStatus,
    pub permission_requests: AtomicUsize,
    pub pictures: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeCamera {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission,
            permission_requests: AtomicUsize::new(0),
            pictures: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn pictures(&self) -> usize {
        self.pictures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn request_permission(&self) -> PermissionStatus {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.permission
    }

    async fn open_preview(&self, _facing: Facing) -> Result<(), CameraError> {
        Ok(())
    }

    async fn take_picture(&self, options: CaptureOptions) -> Result<CapturedImage, CameraError> {
        self.pictures.fetch_add(1, Ordering::SeqCst);
        Ok(if options.base64 {
            photo().with_base64()
        } else {
            photo()
        })
    }

    async fn close_preview(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

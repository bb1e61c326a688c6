//! ponto-hw — Camera collaborator contract and capture session lifecycle.
//!
//! Owns everything that touches the camera: the permission gate, the
//! preview session state machine, and the captured still image.

pub mod busy;
pub mod camera;
pub mod capture;
pub mod permission;
pub mod photo;
pub mod still_camera;

pub use busy::{BusyFlag, BusyGuard};
pub use camera::{Camera, CameraError, CaptureOptions, Facing, PermissionStatus};
pub use capture::{CaptureController, CaptureError, SessionPhase};
pub use permission::{PermissionGate, PermissionState};
pub use photo::CapturedImage;
pub use still_camera::StillImageCamera;

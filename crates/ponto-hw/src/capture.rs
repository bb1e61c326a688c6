//! Capture controller — preview session lifecycle and still capture.
//!
//! ```text
//! NotMounted --mount()--> NotReady --on_ready()--> Ready
//!      \________________________\___________________\___unmount()--> Unmounted
//! ```
//!
//! `capture()` is only permitted in `Ready`, with camera permission granted
//! and no other capture in flight. Every rejection happens before the
//! camera is touched.

use crate::busy::BusyFlag;
use crate::camera::{Camera, CameraError, CaptureOptions, Facing};
use crate::permission::PermissionState;
use crate::photo::CapturedImage;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera is not ready")]
    NotReady,
    #[error("a capture is already in flight")]
    Busy,
    #[error("capture session has been torn down")]
    Unmounted,
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Lifecycle phase of the preview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotMounted,
    NotReady,
    Ready,
    Unmounted,
}

/// Exclusive owner of the camera for the lifetime of a mounted view.
pub struct CaptureController {
    camera: Arc<dyn Camera>,
    facing: Facing,
    permission: PermissionState,
    phase: Mutex<SessionPhase>,
    in_flight: BusyFlag,
    teardown: CancellationToken,
}

impl CaptureController {
    /// Create a controller for a view whose permission has already been resolved.
    pub fn new(camera: Arc<dyn Camera>, facing: Facing, permission: PermissionState) -> Self {
        Self {
            camera,
            facing,
            permission,
            phase: Mutex::new(SessionPhase::NotMounted),
            in_flight: BusyFlag::new(),
            teardown: CancellationToken::new(),
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn phase(&self) -> SessionPhase {
        *self.lock_phase()
    }

    pub fn is_ready(&self) -> bool {
        self.permission.is_granted() && self.phase() == SessionPhase::Ready
    }

    /// Token cancelled when the view is torn down. Work tied to this view
    /// (e.g. an outstanding recognition request) should abort on it.
    pub fn teardown_token(&self) -> CancellationToken {
        self.teardown.child_token()
    }

    /// Start the preview stream. Only valid once, from `NotMounted`.
    pub async fn mount(&self) -> Result<(), CaptureError> {
        if !self.permission.is_granted() {
            return Err(CaptureError::PermissionDenied);
        }
        match self.phase() {
            SessionPhase::NotMounted => {}
            SessionPhase::Unmounted => return Err(CaptureError::Unmounted),
            // Already mounted; nothing to do.
            SessionPhase::NotReady | SessionPhase::Ready => return Ok(()),
        }

        self.camera.open_preview(self.facing).await?;

        // The view may have been torn down while the preview was starting.
        let torn_down = {
            let mut phase = self.lock_phase();
            if *phase == SessionPhase::Unmounted {
                true
            } else {
                *phase = SessionPhase::NotReady;
                false
            }
        };
        if torn_down {
            self.camera.close_preview().await;
            return Err(CaptureError::Unmounted);
        }
        tracing::info!(facing = %self.facing, "preview mounted");
        Ok(())
    }

    /// Readiness event from the camera. Returns whether this call moved the
    /// session to `Ready`; repeated or out-of-phase calls are no-ops.
    pub fn on_ready(&self) -> bool {
        let mut phase = self.lock_phase();
        if *phase == SessionPhase::NotReady {
            *phase = SessionPhase::Ready;
            tracing::info!("camera ready");
            true
        } else {
            tracing::debug!(phase = ?*phase, "ignoring camera ready event");
            false
        }
    }

    /// Acquire one still image.
    pub async fn capture(&self, options: CaptureOptions) -> Result<CapturedImage, CaptureError> {
        if !self.permission.is_granted() {
            return Err(CaptureError::NotReady);
        }
        match self.phase() {
            SessionPhase::Ready => {}
            SessionPhase::Unmounted => return Err(CaptureError::Unmounted),
            SessionPhase::NotMounted | SessionPhase::NotReady => return Err(CaptureError::NotReady),
        }
        let _in_flight = self.in_flight.try_acquire().ok_or(CaptureError::Busy)?;

        let image = tokio::select! {
            biased;
            _ = self.teardown.cancelled() => return Err(CaptureError::Unmounted),
            image = self.camera.take_picture(options) => image?,
        };

        tracing::debug!(
            bytes = image.len(),
            width = image.width,
            height = image.height,
            "captured still image"
        );
        Ok(image)
    }

    /// Tear the view down: no capture may start afterwards and any work
    /// watching [`teardown_token`](Self::teardown_token) is cancelled.
    pub async fn unmount(&self) {
        let previous = {
            let mut phase = self.lock_phase();
            std::mem::replace(&mut *phase, SessionPhase::Unmounted)
        };
        self.teardown.cancel();

        if matches!(previous, SessionPhase::NotReady | SessionPhase::Ready) {
            self.camera.close_preview().await;
        }
        if previous != SessionPhase::Unmounted {
            tracing::info!("preview unmounted");
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, SessionPhase> {
        // The phase is a plain enum; a poisoned lock still holds a valid value.
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}

//! Clock-in screen controller.
//!
//! Owns the permission gate, the capture session and the orchestrator, and
//! is the only writer of the [`StateStore`]. The presentation layer reads
//! state through [`ClockInApp::subscribe`] and acts through [`Intent`]s.

use crate::error::ClockInError;
use crate::orchestrator::Orchestrator;
use crate::outcome::RecognitionOutcome;
use crate::state::{AppState, StateStore};
use ponto_core::{FaceDetector, RecognitionService};
use ponto_hw::{
    Camera, CaptureController, CaptureOptions, Facing, PermissionGate, PermissionState,
};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;

/// User or platform events the screen reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The camera preview reported it is streaming.
    CameraReady,
    /// The user pressed the clock-in button.
    ClockIn,
    /// The screen is going away.
    Leave,
}

pub struct ClockInApp {
    camera: Arc<dyn Camera>,
    facing: Facing,
    gate: PermissionGate,
    /// Created once permission is granted; never exists otherwise.
    controller: OnceLock<CaptureController>,
    orchestrator: Orchestrator,
    store: StateStore,
}

impl ClockInApp {
    pub fn new(
        camera: Arc<dyn Camera>,
        facing: Facing,
        detector: Arc<dyn FaceDetector>,
        service: Arc<dyn RecognitionService>,
        network_timeout: Duration,
    ) -> Self {
        let store = StateStore::new();
        let orchestrator = Orchestrator::new(detector, service, store.clone(), network_timeout);
        Self {
            camera,
            facing,
            gate: PermissionGate::new(),
            controller: OnceLock::new(),
            orchestrator,
            store,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.store.subscribe()
    }

    pub fn state(&self) -> AppState {
        self.store.snapshot()
    }

    /// Resolve permission and, when granted, open the camera preview.
    ///
    /// Permission is requested from the platform at most once per app; a
    /// second call reuses the resolved answer.
    pub async fn start(&self) -> Result<PermissionState, ClockInError> {
        let permission = self.gate.request(self.camera.as_ref()).await;
        self.store.update(|s| s.permission = permission);
        if !permission.is_granted() {
            tracing::warn!("camera permission denied; capture disabled");
            return Ok(permission);
        }

        let controller = self.controller.get_or_init(|| {
            CaptureController::new(self.camera.clone(), self.facing, permission)
        });
        controller.mount().await?;
        tracing::info!(facing = %controller.facing(), "camera preview mounted");
        Ok(permission)
    }

    /// Returns true if this call moved the camera to ready.
    pub fn camera_ready(&self) -> bool {
        let Some(controller) = self.controller.get() else {
            return false;
        };
        let became_ready = controller.on_ready();
        if became_ready {
            self.store.update(|s| s.camera_ready = true);
            tracing::debug!("camera ready");
        }
        became_ready
    }

    /// Run one clock-in attempt and publish its outcome.
    pub async fn clock_in(&self) -> Result<RecognitionOutcome, ClockInError> {
        let Some(controller) = self.controller.get() else {
            return Err(match self.gate.state() {
                PermissionState::Denied => ClockInError::PermissionDenied,
                _ => ClockInError::NotReady,
            });
        };
        if !controller.is_ready() {
            return Err(ClockInError::NotReady);
        }

        let capture = controller.capture(CaptureOptions { base64: true });
        self.orchestrator
            .run_attempt(capture, controller.teardown_token())
            .await
    }

    /// Tear down the preview. An attempt still running is cancelled and
    /// its result discarded.
    pub async fn leave(&self) {
        if let Some(controller) = self.controller.get() {
            controller.unmount().await;
        }
        self.store.update(|s| s.camera_ready = false);
        tracing::info!("left clock-in screen");
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<(), ClockInError> {
        tracing::debug!(?intent, "dispatch");
        match intent {
            Intent::CameraReady => {
                self.camera_ready();
            }
            Intent::ClockIn => {
                self.clock_in().await?;
            }
            Intent::Leave => self.leave().await,
        }
        Ok(())
    }
}

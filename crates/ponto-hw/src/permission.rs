//! Camera permission gate.

use crate::camera::{Camera, PermissionStatus};
use tokio::sync::OnceCell;

/// Camera authorization as seen by the rest of the application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
    /// Request outstanding (or not yet made).
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

impl From<PermissionStatus> for PermissionState {
    fn from(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Granted => PermissionState::Granted,
            PermissionStatus::Denied => PermissionState::Denied,
        }
    }
}

/// Asks the platform for camera authorization exactly once and holds the answer.
///
/// A denial is terminal for the session; there is no re-request.
#[derive(Debug, Default)]
pub struct PermissionGate {
    resolved: OnceCell<PermissionState>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the permission, querying the camera on the first call only.
    /// Concurrent callers share the single outstanding request.
    pub async fn request(&self, camera: &dyn Camera) -> PermissionState {
        *self
            .resolved
            .get_or_init(|| async {
                let state = PermissionState::from(camera.request_permission().await);
                match state {
                    PermissionState::Granted => tracing::info!("camera permission granted"),
                    _ => tracing::warn!("camera permission denied"),
                }
                state
            })
            .await
    }

    /// Current tri-state: `Unknown` until [`request`](Self::request) resolves.
    pub fn state(&self) -> PermissionState {
        self.resolved
            .get()
            .copied()
            .unwrap_or(PermissionState::Unknown)
    }
}

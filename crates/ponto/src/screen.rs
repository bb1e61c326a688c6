//! What the clock-in screen shows for a given state.

use crate::outcome::NO_CAMERA_ACCESS_MESSAGE;
use crate::state::AppState;
use ponto_hw::PermissionState;
use std::fmt;

pub const CLOCK_IN_LABEL: &str = "Clock In";
pub const PROCESSING_LABEL: &str = "Processing...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInButton {
    pub label: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Waiting for the permission answer.
    Loading,
    NoCameraAccess,
    Camera {
        button: ClockInButton,
        /// Status message of the last attempt, if any.
        result: Option<String>,
    },
}

impl Screen {
    pub fn from_state(state: &AppState) -> Self {
        match state.permission {
            PermissionState::Unknown => Screen::Loading,
            PermissionState::Denied => Screen::NoCameraAccess,
            PermissionState::Granted => Screen::Camera {
                button: ClockInButton {
                    label: if state.busy { PROCESSING_LABEL } else { CLOCK_IN_LABEL },
                    enabled: state.camera_ready && !state.busy,
                },
                result: state.result.as_ref().map(|r| r.message()),
            },
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Loading => write!(f, "Loading..."),
            Screen::NoCameraAccess => write!(f, "{NO_CAMERA_ACCESS_MESSAGE}"),
            Screen::Camera { button, result } => {
                let state = if button.enabled { "" } else { " (disabled)" };
                write!(f, "[{}]{state}", button.label)?;
                if let Some(message) = result {
                    write!(f, "\n{message}")?;
                }
                Ok(())
            }
        }
    }
}

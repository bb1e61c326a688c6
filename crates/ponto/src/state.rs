//! Observable application state.
//!
//! The store is the only place permission, readiness, busy and result live.
//! The presentation layer gets read-only [`watch::Receiver`]s; all writes go
//! through the crate's own components.

use crate::outcome::RecognitionOutcome;
use ponto_hw::PermissionState;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub permission: PermissionState,
    pub camera_ready: bool,
    pub busy: bool,
    /// Status of the last attempt; cleared when a new one starts.
    pub result: Option<RecognitionOutcome>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<AppState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AppState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut AppState)) {
        self.tx.send_modify(f);
    }
}

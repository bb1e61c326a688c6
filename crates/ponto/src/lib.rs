//! ponto — Clock-in client.
//!
//! Wires the camera, local face detection and the remote recognition
//! service into a single-shot capture → detect → submit flow, exposing
//! its state to the presentation layer as an observable store.

pub mod app;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod screen;
pub mod state;

#[cfg(test)]
mod testing;

pub use app::{ClockInApp, Intent};
pub use config::{Config, ConfigError};
pub use error::ClockInError;
pub use orchestrator::Orchestrator;
pub use outcome::{NotRecognizedReason, RecognitionOutcome};
pub use screen::Screen;
pub use state::{AppState, StateStore};

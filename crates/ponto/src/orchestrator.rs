//! Recognition orchestrator — one clock-in attempt from photo to outcome.
//!
//! An attempt captures, detects, and either short-circuits on "no face" or
//! submits the photo to the recognition service. Every failure inside the
//! attempt is turned into a [`RecognitionOutcome`] and published to the
//! store; only rejections (busy, cancelled) come back as errors.

use crate::error::ClockInError;
use crate::outcome::RecognitionOutcome;
use crate::state::StateStore;
use ponto_core::{DetectionOptions, FaceDetector, RecognitionRequest, RecognitionService};
use ponto_hw::{BusyFlag, BusyGuard, CaptureError, CapturedImage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// A running attempt. Dropping it clears the busy state on every exit path,
/// including a future dropped mid-flight.
struct Attempt<'a> {
    store: &'a StateStore,
    busy: Option<BusyGuard>,
}

impl<'a> Attempt<'a> {
    fn begin(store: &'a StateStore, busy: BusyGuard) -> Self {
        store.update(|s| {
            s.busy = true;
            s.result = None;
        });
        Self {
            store,
            busy: Some(busy),
        }
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        // Release the flag before observers can see `busy == false`.
        drop(self.busy.take());
        self.store.update(|s| s.busy = false);
    }
}

pub struct Orchestrator {
    detector: Arc<dyn FaceDetector>,
    service: Arc<dyn RecognitionService>,
    store: StateStore,
    busy: BusyFlag,
    network_timeout: Duration,
}

impl Orchestrator {
    /// `network_timeout` bounds the whole recognition call, retries included.
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        service: Arc<dyn RecognitionService>,
        store: StateStore,
        network_timeout: Duration,
    ) -> Self {
        Self {
            detector,
            service,
            store,
            busy: BusyFlag::new(),
            network_timeout,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Run an attempt on an image that has already been captured.
    pub async fn recognize(&self, image: CapturedImage) -> Result<RecognitionOutcome, ClockInError> {
        self.run_attempt(std::future::ready(Ok(image)), CancellationToken::new())
            .await
    }

    /// Run one attempt: await `capture`, detect, then submit or short-circuit.
    ///
    /// Rejected with [`ClockInError::Busy`] (and no side effects) while
    /// another attempt is in flight. If `cancel` fires first, the pipeline
    /// is dropped (aborting any outstanding request), nothing is published,
    /// and [`ClockInError::Cancelled`] is returned.
    pub async fn run_attempt<F>(
        &self,
        capture: F,
        cancel: CancellationToken,
    ) -> Result<RecognitionOutcome, ClockInError>
    where
        F: Future<Output = Result<CapturedImage, CaptureError>> + Send,
    {
        let Some(guard) = self.busy.try_acquire() else {
            tracing::debug!("rejecting clock-in: attempt already in flight");
            return Err(ClockInError::Busy);
        };
        let _attempt = Attempt::begin(&self.store, guard);

        let span = tracing::info_span!("clock_in", attempt = %Uuid::new_v4());
        async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ClockInError::Cancelled),
                result = self.pipeline(capture) => result,
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(ClockInError::Cancelled) => {
                    tracing::info!("attempt cancelled; discarding");
                    return Err(ClockInError::Cancelled);
                }
                Err(ClockInError::NoFaceDetected) => {
                    tracing::info!("no face in photo; skipping recognition");
                    RecognitionOutcome::from_error(&ClockInError::NoFaceDetected)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "clock-in attempt failed");
                    RecognitionOutcome::from_error(&e)
                }
            };

            self.store.update(|s| s.result = Some(outcome.clone()));
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn pipeline<F>(&self, capture: F) -> Result<RecognitionOutcome, ClockInError>
    where
        F: Future<Output = Result<CapturedImage, CaptureError>> + Send,
    {
        let image = capture.await?;
        let detection = self
            .detector
            .detect(&image, &DetectionOptions::clock_in())
            .await?;
        if !detection.face_present() {
            return Err(ClockInError::NoFaceDetected);
        }
        tracing::info!(
            faces = detection.len(),
            bytes = image.len(),
            since_capture_ms = image.captured_at.elapsed().as_millis() as u64,
            "face detected; submitting"
        );

        let request = RecognitionRequest {
            image: image.base64().into_owned(),
            face_data: detection.faces,
        };
        drop(image);

        let response = tokio::time::timeout(self.network_timeout, self.service.recognize(&request))
            .await
            .map_err(|_| {
                ClockInError::Communication(format!(
                    "no response within {}s",
                    self.network_timeout.as_secs_f32()
                ))
            })??;

        tracing::info!(recognized = response.recognized, "recognition response received");
        Ok(RecognitionOutcome::from(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{NotRecognizedReason, ERROR_MESSAGE, NO_FACE_MESSAGE};
    use crate::testing::{photo, FakeDetector, FakeService};
    use ponto_core::types::{ClassificationMode, DetectionMode, LandmarkMode};
    use ponto_hw::CameraError;

    fn orchestrator(
        detector: &Arc<FakeDetector>,
        service: &Arc<FakeService>,
    ) -> (Arc<Orchestrator>, StateStore) {
        let store = StateStore::new();
        let o = Orchestrator::new(
            detector.clone(),
            service.clone(),
            store.clone(),
            Duration::from_secs(5),
        );
        (Arc::new(o), store)
    }

    async fn wait_until_busy(store: &StateStore) {
        let mut rx = store.subscribe();
        rx.wait_for(|s| s.busy).await.unwrap();
    }

    #[tokio::test]
    async fn test_recognized_round_trip() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe"));
        let (o, store) = orchestrator(&detector, &service);

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome, RecognitionOutcome::Recognized { name: "Jane Doe".into() });
        let state = store.snapshot();
        assert!(state.result.unwrap().message().contains("Jane Doe"));
        assert!(!state.busy);
        assert!(!o.is_busy());

        let sent = service.requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image, photo().base64());
        assert_eq!(sent[0].face_data.len(), 1);
    }

    #[tokio::test]
    async fn test_detection_uses_clock_in_options() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::unmatched());
        let (o, _) = orchestrator(&detector, &service);

        o.recognize(photo()).await.unwrap();

        let options = detector.seen_options.lock().unwrap().unwrap();
        assert_eq!(options.mode, DetectionMode::Fast);
        assert_eq!(options.landmarks, LandmarkMode::All);
        assert_eq!(options.classifications, ClassificationMode::All);
    }

    #[tokio::test]
    async fn test_no_face_short_circuits() {
        let detector = Arc::new(FakeDetector::with_faces(0));
        let service = Arc::new(FakeService::recognizing("Jane Doe"));
        let (o, store) = orchestrator(&detector, &service);

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome, RecognitionOutcome::NotRecognized(NotRecognizedReason::NoFace));
        assert_eq!(outcome.message(), NO_FACE_MESSAGE);
        assert_eq!(service.calls(), 0);
        assert!(!store.snapshot().busy);
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn test_unrecognized_differs_from_no_face() {
        let detector = Arc::new(FakeDetector::with_faces(2));
        let service = Arc::new(FakeService::unmatched());
        let (o, _) = orchestrator(&detector, &service);

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome, RecognitionOutcome::NotRecognized(NotRecognizedReason::Unmatched));
        assert_ne!(outcome.message(), NO_FACE_MESSAGE);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_error_becomes_generic_error() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::status(500));
        let (o, store) = orchestrator(&detector, &service);

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome, RecognitionOutcome::Error { message: ERROR_MESSAGE.into() });
        assert_eq!(store.snapshot().result, Some(outcome));
        assert!(!store.snapshot().busy);
        assert_eq!(service.calls(), 1, "no automatic retry");
    }

    #[tokio::test]
    async fn test_detector_failure_releases_busy() {
        let detector = Arc::new(FakeDetector::failing());
        let service = Arc::new(FakeService::recognizing("Jane Doe"));
        let (o, store) = orchestrator(&detector, &service);

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome.message(), ERROR_MESSAGE);
        assert_eq!(service.calls(), 0);
        assert!(!store.snapshot().busy);
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn test_capture_failure_releases_busy() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe"));
        let (o, store) = orchestrator(&detector, &service);

        let failed = async { Err(CaptureError::Camera(CameraError::CaptureFailed("sensor".into()))) };
        let outcome = o.run_attempt(failed, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.message(), ERROR_MESSAGE);
        assert_eq!(detector.calls(), 0);
        assert!(!store.snapshot().busy);
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn test_network_timeout_is_communication_error() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe").delayed(Duration::from_secs(30)));
        let store = StateStore::new();
        let o = Orchestrator::new(
            detector.clone(),
            service.clone(),
            store.clone(),
            Duration::from_millis(50),
        );

        let outcome = o.recognize(photo()).await.unwrap();

        assert_eq!(outcome.message(), ERROR_MESSAGE);
        assert!(!store.snapshot().busy);
    }

    #[tokio::test]
    async fn test_concurrent_attempt_rejected_without_side_effects() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe").gated());
        let (o, store) = orchestrator(&detector, &service);

        let first = tokio::spawn({
            let o = o.clone();
            async move { o.recognize(photo()).await }
        });
        wait_until_busy(&store).await;
        let during = store.snapshot();

        assert!(matches!(o.recognize(photo()).await, Err(ClockInError::Busy)));
        assert_eq!(store.snapshot(), during);

        service.release();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.is_recognized());
        assert_eq!(detector.calls(), 1);
        assert_eq!(service.calls(), 1);
        assert!(!store.snapshot().busy);
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_result() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::unmatched().gated());
        let (o, store) = orchestrator(&detector, &service);

        service.release();
        o.recognize(photo()).await.unwrap();
        assert!(store.snapshot().result.is_some());

        let second = tokio::spawn({
            let o = o.clone();
            async move { o.recognize(photo()).await }
        });
        wait_until_busy(&store).await;
        assert_eq!(store.snapshot().result, None);

        service.release();
        second.await.unwrap().unwrap();
        assert!(store.snapshot().result.is_some());
    }

    #[tokio::test]
    async fn test_cancel_aborts_request_and_publishes_nothing() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe").gated());
        let (o, store) = orchestrator(&detector, &service);
        let cancel = CancellationToken::new();

        let pending = tokio::spawn({
            let o = o.clone();
            let cancel = cancel.clone();
            async move { o.run_attempt(async { Ok(photo()) }, cancel).await }
        });
        while service.calls() == 0 {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        assert!(matches!(pending.await.unwrap(), Err(ClockInError::Cancelled)));
        let state = store.snapshot();
        assert!(!state.busy);
        assert_eq!(state.result, None);
        assert!(!o.is_busy());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_published_only_after_flag_released() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::unmatched().gated());
        let (o, store) = orchestrator(&detector, &service);

        let first = tokio::spawn({
            let o = o.clone();
            async move { o.recognize(photo()).await }
        });
        wait_until_busy(&store).await;

        let watcher = tokio::spawn({
            let o = o.clone();
            let mut rx = store.subscribe();
            async move {
                let mut held_when_idle = false;
                rx.wait_for(|s| {
                    if !s.busy {
                        held_when_idle = o.is_busy();
                    }
                    !s.busy
                })
                .await
                .unwrap();
                held_when_idle
            }
        });

        service.release();
        first.await.unwrap().unwrap();
        assert!(!watcher.await.unwrap());
        assert!(!o.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_attempt_releases_busy() {
        let detector = Arc::new(FakeDetector::with_faces(1));
        let service = Arc::new(FakeService::recognizing("Jane Doe").gated());
        let (o, store) = orchestrator(&detector, &service);

        let pending = tokio::spawn({
            let o = o.clone();
            async move { o.recognize(photo()).await }
        });
        wait_until_busy(&store).await;
        pending.abort();
        let _ = pending.await;

        assert!(!o.is_busy());
        assert!(!store.snapshot().busy);
    }
}

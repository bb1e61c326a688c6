//! Face detection contract and its SCRFD implementation.
//!
//! SCRFD (Sample and Computation Redistribution for Efficient Face
//! Detection) is anchor-free across three strides and yields five-point
//! landmarks alongside each box. It does not classify expressions, so
//! classification fields are left empty.

use crate::types::{
    Bounds, DetectionMode, DetectionOptions, DetectionResult, FaceDescriptor, Point, Size,
};
use async_trait::async_trait;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use ponto_hw::CapturedImage;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Model file expected inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";

const FAST_INPUT_SIZE: u32 = 320;
const ACCURATE_INPUT_SIZE: u32 = 640;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [u32; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("image could not be decoded: {0}")]
    InvalidImage(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Local face detection.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Find faces in a captured image. Zero faces is a successful, empty result.
    async fn detect(
        &self,
        image: &CapturedImage,
        options: &DetectionOptions,
    ) -> Result<DetectionResult, DetectorError>;
}

/// Positions of one stride's (score, bbox, kps) tensors in the model outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideOutputs {
    score: usize,
    bbox: usize,
    kps: usize,
}

/// Maps letterboxed model coordinates back onto the source image.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((input_size as f32 - new_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - new_h) / 2.0).floor(),
        }
    }

    fn to_source(&self, x: f32, y: f32) -> Point {
        Point {
            x: (x - self.pad_x) / self.scale,
            y: (y - self.pad_y) / self.scale,
        }
    }
}

/// Raw detection before conversion into a descriptor.
#[derive(Debug, Clone)]
struct Candidate {
    score: f32,
    top_left: Point,
    bottom_right: Point,
    /// left eye, right eye, nose, left mouth corner, right mouth corner
    landmarks: Option<[Point; 5]>,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.bottom_right.x - self.top_left.x).max(0.0)
            * (self.bottom_right.y - self.top_left.y).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.bottom_right.x.min(other.bottom_right.x)
            - self.top_left.x.max(other.top_left.x))
        .max(0.0);
        let h = (self.bottom_right.y.min(other.bottom_right.y)
            - self.top_left.y.max(other.top_left.y))
        .max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    fn into_descriptor(self, face_id: u32) -> FaceDescriptor {
        let mut face = FaceDescriptor::with_bounds(Bounds {
            origin: self.top_left,
            size: Size {
                width: self.bottom_right.x - self.top_left.x,
                height: self.bottom_right.y - self.top_left.y,
            },
        });
        face.face_id = Some(face_id);
        face.confidence = Some(self.score);

        if let Some([left_eye, right_eye, nose, left_mouth, right_mouth]) = self.landmarks {
            face.roll_angle = Some(
                (right_eye.y - left_eye.y)
                    .atan2(right_eye.x - left_eye.x)
                    .to_degrees(),
            );
            face.left_eye_position = Some(left_eye);
            face.right_eye_position = Some(right_eye);
            face.nose_base_position = Some(nose);
            face.left_mouth_position = Some(left_mouth);
            face.right_mouth_position = Some(right_mouth);
            face.mouth_position = Some(left_mouth.midpoint(right_mouth));
        }
        face
    }
}

struct ScrfdModel {
    session: Session,
    outputs: [StrideOutputs; 3],
}

impl ScrfdModel {
    fn run(&mut self, rgb: &RgbImage, input_size: u32) -> Result<Vec<Candidate>, DetectorError> {
        let (input, letterbox) = preprocess(rgb, input_size);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (slot, &stride) in STRIDES.iter().enumerate() {
            let StrideOutputs { score, bbox, kps } = self.outputs[slot];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };
            candidates.extend(decode_stride(
                extract(score, "scores")?,
                extract(bbox, "boxes")?,
                extract(kps, "landmarks")?,
                stride,
                input_size,
                &letterbox,
            ));
        }
        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// SCRFD detector running on ONNX Runtime.
///
/// Inference is blocking, so it is moved onto tokio's blocking pool; the
/// session sits behind a mutex because `Session::run` needs `&mut`.
#[derive(Clone)]
pub struct ScrfdDetector {
    model: Arc<Mutex<ScrfdModel>>,
}

impl ScrfdDetector {
    /// Path of the SCRFD model inside `model_dir`.
    pub fn model_path(model_dir: &Path) -> PathBuf {
        model_dir.join(SCRFD_MODEL_FILE)
    }

    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        if names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD needs 9 outputs (score/bbox/kps per stride), model has {}",
                names.len()
            )));
        }
        let outputs = map_outputs(&names);
        tracing::info!(path = %model_path.display(), ?outputs, "SCRFD model loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(ScrfdModel { session, outputs })),
        })
    }
}

#[async_trait]
impl FaceDetector for ScrfdDetector {
    async fn detect(
        &self,
        photo: &CapturedImage,
        options: &DetectionOptions,
    ) -> Result<DetectionResult, DetectorError> {
        let data = photo.data.clone();
        let input_size = match options.mode {
            DetectionMode::Fast => FAST_INPUT_SIZE,
            DetectionMode::Accurate => ACCURATE_INPUT_SIZE,
        };
        let model = Arc::clone(&self.model);

        let candidates = tokio::task::spawn_blocking(move || {
            let rgb = image::load_from_memory(&data)
                .map_err(|e| DetectorError::InvalidImage(e.to_string()))?
                .to_rgb8();
            let mut model = model.lock().unwrap_or_else(|p| p.into_inner());
            model.run(&rgb, input_size)
        })
        .await
        .map_err(|e| DetectorError::InferenceFailed(format!("detection task failed: {e}")))??;

        let faces = candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let mut face = candidate.into_descriptor(i as u32);
                options.restrict(&mut face);
                face
            })
            .collect::<Vec<_>>();

        tracing::debug!(faces = faces.len(), input_size, "SCRFD detection finished");
        Ok(DetectionResult::new(faces))
    }
}

/// Locate each stride's tensors by name (`score_8`, `bbox_16`, `kps_32`, ...),
/// falling back to the conventional export order: scores, then boxes, then
/// landmarks, each for strides 8/16/32.
fn map_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let position = |kind: &str, stride: u32| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };
    let by_name: Option<Vec<StrideOutputs>> = STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideOutputs {
                score: position("score", stride)?,
                bbox: position("bbox", stride)?,
                kps: position("kps", stride)?,
            })
        })
        .collect();

    match by_name {
        Some(found) => [found[0], found[1], found[2]],
        None => std::array::from_fn(|slot| StrideOutputs {
            score: slot,
            bbox: slot + 3,
            kps: slot + 6,
        }),
    }
}

/// Letterbox an RGB image into a normalized 1×3×S×S tensor. Padding is left
/// at zero, which is where the mean pixel value lands after normalization.
fn preprocess(rgb: &RgbImage, input_size: u32) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(rgb.width(), rgb.height(), input_size);
    let new_w = ((rgb.width() as f32 * letterbox.scale).round() as u32).clamp(1, input_size);
    let new_h = ((rgb.height() as f32 * letterbox.scale).round() as u32).clamp(1, input_size);
    let resized = image::imageops::resize(rgb, new_w, new_h, FilterType::Triangle);

    let size = input_size as usize;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + pad_x, y as usize + pad_y);
        if tx >= size || ty >= size {
            continue;
        }
        for channel in 0..3 {
            tensor[[0, channel, ty, tx]] = (pixel[channel] as f32 - INPUT_MEAN) / INPUT_STD;
        }
    }
    (tensor, letterbox)
}

/// Turn one stride's raw outputs into source-space candidates above the
/// confidence threshold. Box and landmark outputs are distances from the
/// anchor center in units of the stride.
fn decode_stride(
    scores: &[f32],
    boxes: &[f32],
    kps: &[f32],
    stride: u32,
    input_size: u32,
    letterbox: &Letterbox,
) -> Vec<Candidate> {
    let grid = (input_size / stride) as usize;
    let step = stride as f32;
    let anchors = grid * grid * ANCHORS_PER_CELL;

    scores
        .iter()
        .take(anchors)
        .enumerate()
        .filter(|(_, &score)| score >= CONFIDENCE_THRESHOLD)
        .filter_map(|(idx, &score)| {
            let cell = idx / ANCHORS_PER_CELL;
            let cx = (cell % grid) as f32 * step;
            let cy = (cell / grid) as f32 * step;

            let d = boxes.get(idx * 4..idx * 4 + 4)?;
            let top_left = letterbox.to_source(cx - d[0] * step, cy - d[1] * step);
            let bottom_right = letterbox.to_source(cx + d[2] * step, cy + d[3] * step);

            let landmarks = kps.get(idx * 10..idx * 10 + 10).map(|k| {
                std::array::from_fn(|i| {
                    letterbox.to_source(cx + k[i * 2] * step, cy + k[i * 2 + 1] * step)
                })
            });

            Some(Candidate {
                score,
                top_left,
                bottom_right,
                landmarks,
            })
        })
        .collect()
}

/// Greedy NMS; output is ordered by descending score.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

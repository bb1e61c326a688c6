//! Still-image camera backed by a file on disk.
//!
//! Serves one image file as if it were the camera sensor: permission maps
//! to file readability, opening the preview validates the image, and each
//! capture re-reads the file so an external process can swap it between
//! attempts.

use crate::camera::{Camera, CameraError, CaptureOptions, Facing, PermissionStatus};
use crate::photo::CapturedImage;
use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct StillImageCamera {
    path: PathBuf,
    /// Sensor the preview was opened on; `None` while not streaming.
    streaming: Mutex<Option<Facing>>,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            streaming: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn streaming(&self) -> Option<Facing> {
        *self.streaming.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_streaming(&self, facing: Option<Facing>) {
        *self.streaming.lock().unwrap_or_else(|p| p.into_inner()) = facing;
    }

    async fn read_image(&self) -> Result<CapturedImage, CameraError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CameraError::DeviceNotFound(self.path.display().to_string())
            } else {
                CameraError::Io(e)
            }
        })?;
        let (width, height) = image_dimensions(&data)?;
        Ok(CapturedImage::new(data, width, height))
    }
}

/// Read the dimensions from the image header without decoding pixels.
fn image_dimensions(data: &[u8]) -> Result<(u32, u32), CameraError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| CameraError::UnsupportedFormat(e.to_string()))
}

#[async_trait]
impl Camera for StillImageCamera {
    async fn request_permission(&self) -> PermissionStatus {
        match tokio::fs::File::open(&self.path).await {
            Ok(_) => PermissionStatus::Granted,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "still image not readable");
                PermissionStatus::Denied
            }
        }
    }

    async fn open_preview(&self, facing: Facing) -> Result<(), CameraError> {
        let probe = self.read_image().await?;
        tracing::info!(
            path = %self.path.display(),
            %facing,
            width = probe.width,
            height = probe.height,
            "still image camera streaming"
        );
        self.set_streaming(Some(facing));
        Ok(())
    }

    async fn take_picture(&self, options: CaptureOptions) -> Result<CapturedImage, CameraError> {
        if self.streaming().is_none() {
            return Err(CameraError::NotStreaming);
        }
        let image = self.read_image().await?;
        Ok(if options.base64 {
            image.with_base64()
        } else {
            image
        })
    }

    async fn close_preview(&self) {
        self.set_streaming(None);
    }
}

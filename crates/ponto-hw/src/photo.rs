//! Captured still image.

use base64::Engine;
use std::borrow::Cow;
use std::fmt;

/// One still image acquired from the camera.
///
/// Holds the encoded bytes (JPEG, PNG, ...) exactly as the device produced
/// them. Owned by a single recognition attempt and dropped when it settles.
#[derive(Clone)]
pub struct CapturedImage {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Base64 encoding of `data`, present when requested at capture time.
    pub base64: Option<String>,
    pub captured_at: std::time::Instant,
}

impl CapturedImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            base64: None,
            captured_at: std::time::Instant::now(),
        }
    }

    /// Attach the base64 encoding now instead of at submit time.
    pub fn with_base64(mut self) -> Self {
        if self.base64.is_none() {
            self.base64 = Some(encode(&self.data));
        }
        self
    }

    /// Base64 form of the image for transport, reusing the capture-time
    /// encoding when there is one.
    pub fn base64(&self) -> Cow<'_, str> {
        match &self.base64 {
            Some(encoded) => Cow::Borrowed(encoded.as_str()),
            None => Cow::Owned(encode(&self.data)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Image bytes are never printed; only their size.
impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("base64", &self.base64.is_some())
            .finish()
    }
}

fn encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

//! Media capture surface consumed by the scanner.
//!
//! A camera hands back two halves: a `MediaStream` that owns the device
//! tracks and can be stopped from anywhere, and a `VideoSurface` that yields
//! frames at the display refresh cadence.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::frame::Frame;

/// Which camera to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera, the usual choice for scanning.
    #[default]
    Environment,
}

/// The camera could not be opened (permission denied, no device, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraError {
    pub message: String,
}

impl CameraError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CameraError {}

/// The stream died while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StreamError {}

/// Handle to the live device tracks.
pub trait MediaStream: Send + Sync {
    /// Stops every track. The scanner calls this at most once per stream.
    fn stop_tracks(&self);
}

/// Frame source attached to a stream.
pub trait VideoSurface: Send {
    /// Waits for the next display refresh.
    ///
    /// Resolves to `Ok(None)` while the surface does not yet have enough
    /// buffered data to produce a frame.
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>, StreamError>>;
}

/// Result of a successful camera open.
pub struct CaptureStream {
    pub stream: Arc<dyn MediaStream>,
    pub surface: Box<dyn VideoSurface>,
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream").finish_non_exhaustive()
    }
}

/// Camera access.
pub trait Camera: Send + Sync {
    fn open(&self, facing: FacingMode) -> BoxFuture<'_, Result<CaptureStream, CameraError>>;
}

/// Camera for hosts with no capture device; every open fails.
///
/// Front ends without a camera backend plug this in so the scan path
/// degrades to image upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCamera;

impl Camera for NoCamera {
    fn open(&self, _facing: FacingMode) -> BoxFuture<'_, Result<CaptureStream, CameraError>> {
        Box::pin(async { Err(CameraError::new("no camera available on this device")) })
    }
}

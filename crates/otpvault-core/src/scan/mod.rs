//! QR acquisition: camera lifecycle, frame loop and still-image fallback.
//!
//! State machine:
//!
//! ```text
//! Idle --start_camera_scan--> Acquiring --open ok--> Scanning
//!   ^                            |                     |
//!   +------ open failed ---------+                     |
//!   +---- decoded / stop() / stream failure -----------+
//! ```
//!
//! The active attempt lives in a single mutex-guarded slot. Whoever takes it
//! out of the slot (the frame loop on a successful decode, `stop()`, or the
//! loop on a stream failure) is the one that stops the tracks, so every exit
//! releases the stream exactly once. The first writer wins: a decode that
//! lands after `stop()` finds the slot empty and is dropped.

pub mod camera;
pub mod frame;
pub mod still;

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use camera::{
    Camera, CameraError, CaptureStream, FacingMode, MediaStream, NoCamera, StreamError,
    VideoSurface,
};
pub use frame::{Decoder, Frame, FrameError};

/// Observable scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Acquiring,
    Scanning,
}

/// How a camera scan attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A QR payload was read; the stream has been released.
    Decoded(String),
    /// `stop()` ended the attempt.
    Cancelled,
    /// The stream failed mid-scan; the stream has been released.
    StreamFailed(String),
}

/// Errors from starting a camera scan or decoding a still image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A scan is already acquiring or running.
    Busy,
    /// The camera could not be opened. Callers should offer image upload.
    CameraUnavailable(String),
    /// `stop()` was called while the camera was being acquired.
    Cancelled,
    /// The still image decoded but contained no QR code.
    NoCodeFound,
    /// The still image could not be read or decoded.
    InvalidImage(String),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Busy => write!(f, "A scan is already in progress"),
            ScanError::CameraUnavailable(reason) => write!(
                f,
                "Camera unavailable ({reason}). Upload an image of the QR code instead."
            ),
            ScanError::Cancelled => write!(f, "Scan cancelled"),
            ScanError::NoCodeFound => write!(f, "No QR code found in image"),
            ScanError::InvalidImage(reason) => write!(f, "Could not read image: {reason}"),
        }
    }
}

impl std::error::Error for ScanError {}

/// The live camera session. At most one exists per scanner.
struct CameraSession {
    id: u64,
    scanning: Arc<AtomicBool>,
    cancel: CancellationToken,
    /// `None` while acquiring.
    stream: Option<Arc<dyn MediaStream>>,
}

impl CameraSession {
    /// Clears the flag, wakes the loop and stops the tracks.
    fn release(self) {
        self.scanning.store(false, Ordering::Release);
        self.cancel.cancel();
        if let Some(stream) = self.stream {
            stream.stop_tracks();
            debug!(scan_id = self.id, "camera stream released");
        }
    }
}

struct Shared {
    slot: Mutex<Option<CameraSession>>,
    next_id: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<CameraSession>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the session out of the slot if it is still attempt `id`.
    fn take_if(&self, id: u64) -> Option<CameraSession> {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            slot.take()
        } else {
            None
        }
    }
}

/// Clears attempt `id` from the slot unless disarmed. Covers a start future
/// dropped while the camera is still opening.
struct AcquireGuard<'a> {
    shared: &'a Shared,
    id: u64,
    armed: bool,
}

impl AcquireGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Some(session) = self.shared.take_if(self.id)
        {
            debug!(scan_id = self.id, "camera acquisition abandoned");
            session.release();
        }
    }
}

/// Handle to a running frame loop.
#[derive(Debug)]
pub struct ScanTask {
    handle: JoinHandle<ScanOutcome>,
}

impl ScanTask {
    /// Waits for the loop to finish.
    pub async fn outcome(self) -> ScanOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => ScanOutcome::StreamFailed(format!("scan task failed: {e}")),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// QR acquisition controller.
pub struct QrScanner {
    camera: Arc<dyn Camera>,
    decoder: Arc<dyn Decoder>,
    facing: FacingMode,
    shared: Arc<Shared>,
}

impl fmt::Debug for QrScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrScanner")
            .field("facing", &self.facing)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl QrScanner {
    pub fn new(camera: Arc<dyn Camera>, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            camera,
            decoder,
            facing: FacingMode::default(),
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn with_facing(mut self, facing: FacingMode) -> Self {
        self.facing = facing;
        self
    }

    pub fn state(&self) -> ScanState {
        match self.shared.lock().as_ref() {
            None => ScanState::Idle,
            Some(session) if session.stream.is_none() => ScanState::Acquiring,
            Some(_) => ScanState::Scanning,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.state() == ScanState::Scanning
    }

    /// Opens the camera and starts the frame loop.
    ///
    /// # Errors
    /// - `Busy` if an attempt is already acquiring or scanning.
    /// - `CameraUnavailable` if the camera cannot be opened; the scanner is
    ///   back in `Idle` and the caller should fall back to image upload.
    /// - `Cancelled` if `stop()` was called while the camera was opening; the
    ///   stream obtained late is released before returning.
    pub async fn start_camera_scan(&self) -> Result<ScanTask, ScanError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let scanning = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        {
            let mut slot = self.shared.lock();
            if slot.is_some() {
                return Err(ScanError::Busy);
            }
            *slot = Some(CameraSession {
                id,
                scanning: Arc::clone(&scanning),
                cancel: cancel.clone(),
                stream: None,
            });
        }
        let guard = AcquireGuard {
            shared: &self.shared,
            id,
            armed: true,
        };
        debug!(scan_id = id, facing = ?self.facing, "acquiring camera");

        let capture = match self.camera.open(self.facing).await {
            Ok(capture) => capture,
            Err(e) => {
                drop(guard);
                warn!(scan_id = id, error = %e, "camera unavailable");
                return Err(ScanError::CameraUnavailable(e.message));
            }
        };

        let attached = {
            let mut slot = self.shared.lock();
            match slot.as_mut() {
                Some(session) if session.id == id => {
                    session.stream = Some(Arc::clone(&capture.stream));
                    true
                }
                _ => false,
            }
        };
        guard.disarm();
        if !attached {
            capture.stream.stop_tracks();
            debug!(scan_id = id, "stopped while acquiring");
            return Err(ScanError::Cancelled);
        }
        debug!(scan_id = id, "scanning");

        let handle = tokio::spawn(frame_loop(
            id,
            capture.surface,
            Arc::clone(&self.decoder),
            Arc::clone(&self.shared),
            scanning,
            cancel,
        ));
        Ok(ScanTask { handle })
    }

    /// Ends the current attempt, if any, and releases the stream.
    ///
    /// Safe to call repeatedly, while idle, or after a decode already
    /// finished the scan.
    pub fn stop(&self) {
        let session = self.shared.lock().take();
        if let Some(session) = session {
            debug!(scan_id = session.id, "scan stopped");
            session.release();
        }
    }

    /// Decodes a still image (upload fallback). Never touches the camera.
    ///
    /// # Errors
    /// `InvalidImage` if the bytes are not a readable image, `NoCodeFound` if
    /// no QR payload is present.
    pub fn decode_image(&self, data: &[u8]) -> Result<String, ScanError> {
        let frame = still::frame_from_image_bytes(data)
            .map_err(|e| ScanError::InvalidImage(format!("{e:#}")))?;
        self.decode_frame(&frame)
    }

    /// Reads and decodes an image file. Never touches the camera.
    ///
    /// # Errors
    /// Same as [`QrScanner::decode_image`].
    pub fn decode_image_file(&self, path: &Path) -> Result<String, ScanError> {
        let frame = still::frame_from_image_file(path)
            .map_err(|e| ScanError::InvalidImage(format!("{e:#}")))?;
        self.decode_frame(&frame)
    }

    fn decode_frame(&self, frame: &Frame) -> Result<String, ScanError> {
        frame
            .decode_with(self.decoder.as_ref())
            .ok_or(ScanError::NoCodeFound)
    }
}

impl Drop for QrScanner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-frame decode loop.
///
/// Runs until a payload is decoded, `stop()` cancels it, or the surface
/// fails. Each iteration re-checks the `scanning` flag after the frame
/// arrives so a frame delivered after `stop()` is ignored.
async fn frame_loop(
    id: u64,
    mut surface: Box<dyn VideoSurface>,
    decoder: Arc<dyn Decoder>,
    shared: Arc<Shared>,
    scanning: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> ScanOutcome {
    let mut frames: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return ScanOutcome::Cancelled,
            next = surface.next_frame() => next,
        };

        if !scanning.load(Ordering::Acquire) {
            return ScanOutcome::Cancelled;
        }

        match next {
            Ok(None) => {}
            Ok(Some(frame)) => {
                frames += 1;
                let Some(payload) = frame.decode_with(decoder.as_ref()) else {
                    continue;
                };
                return match shared.take_if(id) {
                    Some(session) => {
                        debug!(scan_id = id, frames, "QR code decoded");
                        session.release();
                        ScanOutcome::Decoded(payload)
                    }
                    None => ScanOutcome::Cancelled,
                };
            }
            Err(e) => {
                warn!(scan_id = id, error = %e, "camera stream failed");
                if let Some(session) = shared.take_if(id) {
                    session.release();
                }
                return ScanOutcome::StreamFailed(e.message);
            }
        }
    }
}

//! Capture devices.
//!
//! This module provides the camera side of the recognition loop:
//! - `CaptureDevice`: backend seam (synthetic `stub://` cameras, V4L2 devices)
//! - `CaptureAdapter`: stream lifecycle on top of a device (acquire, readiness wait,
//!   release, non-blocking current frame)
//! - device leases, so a device is never held by two sessions at once
//!
//! Acquiring a real device may trigger an OS permission prompt and turns on the
//! camera indicator. Both are visible to the user and outside this crate's control.

mod adapter;
mod lease;
pub mod synthetic;
#[cfg(feature = "capture-v4l2")]
pub mod v4l2;

use anyhow::Result;

pub use adapter::{CaptureAdapter, FrameStatus, Readiness, StreamHandle, READY_ATTEMPTS, READY_TIMEOUT};
pub use lease::DeviceLease;
pub use synthetic::{SyntheticCamera, SyntheticConfig, SyntheticControl};
#[cfg(feature = "capture-v4l2")]
pub use v4l2::V4l2Camera;

use crate::clock::SharedClock;
use crate::frame::{Frame, FrameDimensions};
use crate::profile::CaptureConstraints;

/// Capture failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureError {
    PermissionDenied(String),
    DeviceUnavailable(String),
    Timeout(String),
    Io(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(msg) => write!(f, "camera permission denied: {}", msg),
            Self::DeviceUnavailable(msg) => write!(f, "camera unavailable: {}", msg),
            Self::Timeout(msg) => write!(f, "camera timed out: {}", msg),
            Self::Io(msg) => write!(f, "camera i/o error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Playback state of an open stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Live,
    Paused,
    Ended,
}

/// Camera backend trait.
///
/// Implementations must not retain frames after handing them out and must make
/// `close` safe to call at any time, including repeatedly.
pub trait CaptureDevice: Send {
    /// Stable device identifier (path or `stub://` name). Used for leases.
    fn id(&self) -> &str;

    /// Start streaming under the given constraints.
    fn open(&mut self, constraints: &CaptureConstraints) -> Result<(), CaptureError>;

    /// Stop all tracks.
    fn close(&mut self);

    /// Negotiated frame size, `None` until the stream reports one.
    fn dimensions(&self) -> Option<FrameDimensions>;

    fn stream_state(&self) -> StreamState;

    /// The most recent frame, if one is available.
    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Open a capture device by path.
///
/// `stub://` paths give a synthetic camera; anything else is a V4L2 device node and
/// needs the `capture-v4l2` feature.
pub fn open_device(path: &str, clock: SharedClock) -> Result<Box<dyn CaptureDevice>> {
    if path.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(
            SyntheticConfig::new(path),
            clock,
        )));
    }
    #[cfg(feature = "capture-v4l2")]
    {
        let _ = clock;
        Ok(Box::new(V4l2Camera::new(path)))
    }
    #[cfg(not(feature = "capture-v4l2"))]
    {
        let _ = clock;
        anyhow::bail!("camera device {} requires the capture-v4l2 feature", path)
    }
}

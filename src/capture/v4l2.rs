//! V4L2 camera backend.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates an RGB format close to the
//! requested constraints and reads frames from a memory-mapped stream. Frames are
//! copied out of the mmap buffer and handed to the session for one tick only.
//!
//! Dequeues wait at most `DEQUEUE_TIMEOUT`, so a silent camera yields `None` instead of
//! blocking the tick. A stream with no buffer for `STALL_AFTER` stops reporting
//! dimensions, which lets the session watchdog reset it.

use std::time::{Duration, Instant};

use ouroboros::self_referencing;

use super::{CaptureDevice, CaptureError, StreamState};
use crate::frame::{Frame, FrameDimensions};
use crate::profile::CaptureConstraints;

/// Longest a single dequeue may wait for the driver.
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(5);

/// Silence after which the stream counts as stalled.
const STALL_AFTER: Duration = Duration::from_secs(2);

pub struct V4l2Camera {
    path: String,
    state: Option<V4l2Stream>,
    active: Option<FrameDimensions>,
    last_buffer: Option<Instant>,
    sequence: u64,
    ended: bool,
}

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            state: None,
            active: None,
            last_buffer: None,
            sequence: 0,
            ended: false,
        }
    }
}

fn is_dequeue_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn is_stalled(last_buffer: Option<Instant>, now: Instant) -> bool {
    last_buffer.is_some_and(|at| now.saturating_duration_since(at) >= STALL_AFTER)
}

fn map_open_error(path: &str, err: std::io::Error) -> CaptureError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => {
            CaptureError::PermissionDenied(format!("{}: {}", path, err))
        }
        std::io::ErrorKind::NotFound => CaptureError::DeviceUnavailable(format!("{}: {}", path, err)),
        _ => CaptureError::Io(format!("{}: {}", path, err)),
    }
}

impl CaptureDevice for V4l2Camera {
    fn id(&self) -> &str {
        &self.path
    }

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<(), CaptureError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        self.close();
        let device = v4l::Device::with_path(&self.path).map_err(|err| map_open_error(&self.path, err))?;
        let mut format = device
            .format()
            .map_err(|err| CaptureError::Io(format!("read v4l2 format: {}", err)))?;
        format.width = constraints.width;
        format.height = constraints.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", self.path, err);
                device
                    .format()
                    .map_err(|err| CaptureError::Io(format!("read v4l2 format: {}", err)))?
            }
        };

        let params = v4l::video::capture::Parameters::with_fps(constraints.frame_rate);
        if let Err(err) = device.set_params(&params) {
            log::warn!("V4l2Camera: failed to set fps on {}: {}", self.path, err);
        }

        let state = V4l2StreamTryBuilder {
            device,
            stream_builder: |device| {
                let mut stream = v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| CaptureError::Io(format!("create v4l2 buffer stream: {}", err)))?;
                stream.set_timeout(DEQUEUE_TIMEOUT);
                Ok(stream)
            },
        }
        .try_build()?;

        self.state = Some(state);
        self.active = FrameDimensions::new(format.width, format.height);
        self.last_buffer = Some(Instant::now());
        self.ended = false;
        log::info!(
            "V4l2Camera: opened {} ({}x{})",
            self.path,
            format.width,
            format.height
        );
        Ok(())
    }

    fn close(&mut self) {
        self.state = None;
        self.active = None;
        self.last_buffer = None;
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        if is_stalled(self.last_buffer, Instant::now()) {
            return None;
        }
        self.active
    }

    fn stream_state(&self) -> StreamState {
        match (&self.state, self.ended) {
            (None, _) => StreamState::Closed,
            (Some(_), true) => StreamState::Ended,
            (Some(_), false) => StreamState::Live,
        }
    }

    /// Waits at most `DEQUEUE_TIMEOUT` for the driver to hand over a buffer.
    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        use v4l::io::traits::CaptureStream;

        let Some(dimensions) = self.active else {
            return Ok(None);
        };
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let captured = state.with_mut(|fields| {
            fields.stream.next().map(|(buf, meta)| {
                let timestamp_ms =
                    meta.timestamp.sec as u64 * 1_000 + meta.timestamp.usec as u64 / 1_000;
                (buf.to_vec(), timestamp_ms)
            })
        });
        let (pixels, timestamp_ms) = match captured {
            Ok(captured) => captured,
            Err(err) if is_dequeue_timeout(&err) => return Ok(None),
            Err(err) => {
                self.ended = true;
                return Err(CaptureError::Io(format!("capture v4l2 frame: {}", err)));
            }
        };

        self.last_buffer = Some(Instant::now());
        self.sequence += 1;
        Ok(Some(Frame::new(
            pixels,
            dimensions.width,
            dimensions.height,
            timestamp_ms,
            self.sequence,
        )))
    }
}

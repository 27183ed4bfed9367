//! Captured frames.
//!
//! - `Frame`: opaque container for one captured image. Bytes are private.
//! - `FrameView`: what the session hands around. It exposes dimensions and timing and
//!   can run a classifier, but cannot hand out the bytes.
//!
//! Frames live for a single tick. Pixel data is zeroized when the frame is dropped.
//!
//! ```compile_fail
//! use gesture_nav::Frame;
//!
//! fn leak(frame: Frame) -> Vec<u8> {
//!     frame.data
//! }
//! ```

use anyhow::Result;
use zeroize::Zeroize;

use crate::classify::{GestureClassifier, Recognition};

/// Width and height of a frame in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    /// Zero in either direction means the stream has not negotiated a size yet.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }
}

/// Opaque captured frame. There is no `Clone` and no byte accessor.
pub struct Frame {
    /// Private RGB bytes.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Media time of the frame in milliseconds. Repeats when the camera stalls.
    pub timestamp_ms: u64,

    /// Per-stream capture counter.
    pub sequence: u64,
}

impl Frame {
    /// Called only by capture backends.
    pub(crate) fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        FrameDimensions {
            width: self.width,
            height: self.height,
        }
    }

    #[cfg(test)]
    pub(crate) fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// Read-only view of a frame for inference.
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.frame.timestamp_ms
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.frame.dimensions()
    }

    /// Run a classifier on this frame. The classifier receives the pixels for the
    /// duration of the call only.
    pub fn run_classifier(
        &self,
        classifier: &mut dyn GestureClassifier,
        timestamp_ms: u64,
    ) -> Result<Recognition> {
        classifier.classify(
            &self.frame.data,
            self.frame.width,
            self.frame.height,
            timestamp_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{GestureCandidate, HandSide, RunningMode};

    struct ByteCounter {
        seen: usize,
    }

    impl GestureClassifier for ByteCounter {
        fn name(&self) -> &'static str {
            "byte-counter"
        }

        fn set_running_mode(&mut self, _mode: RunningMode) -> Result<()> {
            Ok(())
        }

        fn classify(
            &mut self,
            pixels: &[u8],
            _width: u32,
            _height: u32,
            _timestamp_ms: u64,
        ) -> Result<Recognition> {
            self.seen = pixels.len();
            Ok(Recognition {
                gestures: vec![GestureCandidate::new("Open_Palm", 0.5, HandSide::Left)],
                landmarks: vec![],
            })
        }
    }

    #[test]
    fn zero_dimensions_are_not_ready() {
        assert!(FrameDimensions::new(0, 480).is_none());
        assert!(FrameDimensions::new(640, 0).is_none());
        assert_eq!(
            FrameDimensions::new(640, 480),
            Some(FrameDimensions {
                width: 640,
                height: 480
            })
        );
    }

    #[test]
    fn view_runs_classifier_on_private_bytes() {
        let frame = Frame::new(vec![7u8; 12], 2, 2, 40, 1);
        let view = frame.view();
        let mut classifier = ByteCounter { seen: 0 };

        let recognition = view.run_classifier(&mut classifier, 40).unwrap();

        assert_eq!(classifier.seen, frame.byte_len());
        assert_eq!(recognition.top().unwrap().label, "Open_Palm");
        assert_eq!(view.timestamp_ms(), 40);
    }
}

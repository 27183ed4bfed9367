use anyhow::Result;

use crate::classify::result::Recognition;

/// How the classifier expects to be called.
///
/// Engines start in `Image` mode (independent calls) and must be switched to `Video`
/// once before they are fed a continuous stream with increasing timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunningMode {
    Image,
    Video,
}

/// Gesture classifier trait.
///
/// Implementations must treat the pixel slice as read-only and must not keep it past
/// the `classify` call. Candidates are returned ranked by confidence, highest first.
pub trait GestureClassifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Switch the running mode.
    fn set_running_mode(&mut self, mode: RunningMode) -> Result<()>;

    /// Classify one frame.
    fn classify(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: u64,
    ) -> Result<Recognition>;
}

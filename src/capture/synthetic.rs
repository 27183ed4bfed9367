//! Synthetic camera for `stub://` device paths.
//!
//! Produces frames at the requested frame rate against a shared clock, so frame
//! timestamps repeat when the recognition loop ticks faster than the camera. A
//! `SyntheticControl` handle lets hosts and tests simulate the failure modes of real
//! cameras: refused permission, missing device, slow warm-up, stalls and pauses.

use std::sync::{Arc, Mutex};

use rand::Rng;

use super::{CaptureDevice, CaptureError, StreamState};
use crate::clock::SharedClock;
use crate::frame::{Frame, FrameDimensions};
use crate::profile::CaptureConstraints;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Device id, e.g. "stub://front_camera".
    pub id: String,
    /// Time between `open` and the first reported dimensions.
    pub warmup_ms: u64,
}

impl SyntheticConfig {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            warmup_ms: 0,
        }
    }

    pub fn with_warmup_ms(mut self, warmup_ms: u64) -> Self {
        self.warmup_ms = warmup_ms;
        self
    }
}

#[derive(Debug, Default)]
struct ControlState {
    permission_denied: bool,
    unavailable: bool,
    stalled: bool,
    paused: bool,
    opens: u32,
}

/// Remote control for a synthetic camera that has been moved into a session.
#[derive(Clone, Default)]
pub struct SyntheticControl {
    state: Arc<Mutex<ControlState>>,
}

impl SyntheticControl {
    fn with<T>(&self, f: impl FnOnce(&mut ControlState) -> T) -> Option<T> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }

    pub fn deny_permission(&self, denied: bool) {
        self.with(|state| state.permission_denied = denied);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.with(|state| state.unavailable = unavailable);
    }

    /// A stalled camera stays open but stops reporting dimensions.
    pub fn set_stalled(&self, stalled: bool) {
        self.with(|state| state.stalled = stalled);
    }

    pub fn set_paused(&self, paused: bool) {
        self.with(|state| state.paused = paused);
    }

    /// Number of successful or attempted `open` calls so far.
    pub fn opens(&self) -> u32 {
        self.with(|state| state.opens).unwrap_or(0)
    }
}

pub struct SyntheticCamera {
    config: SyntheticConfig,
    clock: SharedClock,
    control: SyntheticControl,
    active: Option<CaptureConstraints>,
    opened_at_ms: u64,
    sequence: u64,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            control: SyntheticControl::default(),
            active: None,
            opened_at_ms: 0,
            sequence: 0,
        }
    }

    pub fn control(&self) -> SyntheticControl {
        self.control.clone()
    }

    fn frame_period_ms(constraints: &CaptureConstraints) -> u64 {
        (1_000 / constraints.frame_rate.max(1) as u64).max(1)
    }

    /// Flat grey scene with a little sensor noise.
    fn generate_pixels(&self, dimensions: FrameDimensions) -> Vec<u8> {
        let len = dimensions.width as usize * dimensions.height as usize * 3;
        let mut pixels = vec![96u8; len];
        let mut rng = rand::thread_rng();
        for pixel in pixels.iter_mut().step_by(97) {
            *pixel = pixel.wrapping_add(rng.gen_range(0..8));
        }
        pixels
    }
}

impl CaptureDevice for SyntheticCamera {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn open(&mut self, constraints: &CaptureConstraints) -> Result<(), CaptureError> {
        let (denied, unavailable) = self
            .control
            .with(|state| {
                state.opens += 1;
                (state.permission_denied, state.unavailable)
            })
            .unwrap_or((false, false));
        if denied {
            return Err(CaptureError::PermissionDenied(format!(
                "{}: access refused",
                self.config.id
            )));
        }
        if unavailable {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{}: no such device",
                self.config.id
            )));
        }

        self.active = Some(*constraints);
        self.opened_at_ms = self.clock.now_ms();
        log::info!(
            "SyntheticCamera: opened {} ({}x{} @ {} fps, synthetic)",
            self.config.id,
            constraints.width,
            constraints.height,
            constraints.frame_rate
        );
        Ok(())
    }

    fn close(&mut self) {
        self.active = None;
    }

    fn dimensions(&self) -> Option<FrameDimensions> {
        let constraints = self.active?;
        let stalled = self.control.with(|state| state.stalled).unwrap_or(false);
        let warmed_up =
            self.clock.now_ms().saturating_sub(self.opened_at_ms) >= self.config.warmup_ms;
        if stalled || !warmed_up {
            return None;
        }
        FrameDimensions::new(constraints.width, constraints.height)
    }

    fn stream_state(&self) -> StreamState {
        if self.active.is_none() {
            return StreamState::Closed;
        }
        if self.control.with(|state| state.paused).unwrap_or(false) {
            StreamState::Paused
        } else {
            StreamState::Live
        }
    }

    fn latest_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let Some(constraints) = self.active else {
            return Ok(None);
        };
        let Some(dimensions) = self.dimensions() else {
            return Ok(None);
        };
        let period = Self::frame_period_ms(&constraints);
        let timestamp_ms = (self.clock.now_ms() / period) * period;
        self.sequence += 1;

        Ok(Some(Frame::new(
            self.generate_pixels(dimensions),
            dimensions.width,
            dimensions.height,
            timestamp_ms,
            self.sequence,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::profile::Facing;

    fn constraints() -> CaptureConstraints {
        CaptureConstraints {
            width: 32,
            height: 24,
            frame_rate: 10,
            facing: Facing::User,
        }
    }

    #[test]
    fn frames_repeat_timestamps_within_a_frame_period() {
        let clock = ManualClock::new(1_000);
        let mut camera = SyntheticCamera::new(SyntheticConfig::new("stub://synthetic"), clock.shared());
        camera.open(&constraints()).unwrap();

        let first = camera.latest_frame().unwrap().unwrap();
        clock.advance(40);
        let same_period = camera.latest_frame().unwrap().unwrap();
        clock.advance(70);
        let next_period = camera.latest_frame().unwrap().unwrap();

        assert_eq!(first.timestamp_ms, same_period.timestamp_ms);
        assert_ne!(first.timestamp_ms, next_period.timestamp_ms);
        assert_eq!(first.width, 32);
        assert_eq!(next_period.sequence, 3);
    }

    #[test]
    fn closed_camera_reports_nothing() {
        let clock = ManualClock::new(0);
        let mut camera = SyntheticCamera::new(SyntheticConfig::new("stub://closed"), clock.shared());
        assert_eq!(camera.stream_state(), StreamState::Closed);
        assert!(camera.dimensions().is_none());
        assert!(camera.latest_frame().unwrap().is_none());
        camera.close();
        camera.close();
    }

    #[test]
    fn unavailable_device_fails_open() {
        let clock = ManualClock::new(0);
        let mut camera = SyntheticCamera::new(SyntheticConfig::new("stub://gone"), clock.shared());
        camera.control().set_unavailable(true);
        assert!(matches!(
            camera.open(&constraints()),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }
}

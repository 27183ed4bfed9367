use std::time::Duration;

use super::lease::DeviceLease;
use super::{CaptureDevice, CaptureError, StreamState};
use crate::clock::SharedClock;
use crate::frame::{Frame, FrameDimensions};
use crate::profile::CaptureConstraints;

/// How long a stream may take to report frame dimensions, per attempt.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts before `acquire` gives up on a stream without dimensions.
pub const READY_ATTEMPTS: u32 = 2;

const READY_POLL: Duration = Duration::from_millis(50);

/// Outcome of waiting for a stream to report dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready(FrameDimensions),
    TimedOut,
}

/// Descriptor of an acquired stream. Stale handles read as `NotReady`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamHandle {
    generation: u64,
    pub dimensions: FrameDimensions,
    pub constraints: CaptureConstraints,
}

pub enum FrameStatus {
    Ready(Frame),
    NotReady,
}

/// Stream lifecycle on top of a `CaptureDevice`.
pub struct CaptureAdapter {
    device: Box<dyn CaptureDevice>,
    clock: SharedClock,
    lease: Option<DeviceLease>,
    stream: Option<StreamHandle>,
    generation: u64,
    ready_timeout: Duration,
}

impl CaptureAdapter {
    pub fn new(device: Box<dyn CaptureDevice>, clock: SharedClock) -> Self {
        Self {
            device,
            clock,
            lease: None,
            stream: None,
            generation: 0,
            ready_timeout: READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn device_id(&self) -> &str {
        self.device.id()
    }

    pub fn stream(&self) -> Option<StreamHandle> {
        self.stream
    }

    /// Request the camera and wait until it reports frame dimensions.
    ///
    /// A stream that stays without dimensions is re-opened once before failing with
    /// `CaptureError::Timeout`. Any failure leaves the device released.
    pub fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<StreamHandle, CaptureError> {
        if let Some(handle) = self.stream {
            return Ok(handle);
        }
        if self.lease.is_none() {
            self.lease = Some(DeviceLease::claim(self.device.id())?);
        }

        for attempt in 1..=READY_ATTEMPTS {
            if let Err(err) = self.device.open(constraints) {
                log::warn!("camera {}: open failed: {}", self.device.id(), err);
                self.release();
                return Err(err);
            }
            match self.await_ready(self.ready_timeout) {
                Readiness::Ready(dimensions) => {
                    self.generation += 1;
                    let handle = StreamHandle {
                        generation: self.generation,
                        dimensions,
                        constraints: *constraints,
                    };
                    self.stream = Some(handle);
                    log::info!(
                        "camera {}: streaming {}x{}",
                        self.device.id(),
                        dimensions.width,
                        dimensions.height
                    );
                    return Ok(handle);
                }
                Readiness::TimedOut => {
                    log::warn!(
                        "camera {}: no frame dimensions after {:?} (attempt {}/{})",
                        self.device.id(),
                        self.ready_timeout,
                        attempt,
                        READY_ATTEMPTS
                    );
                    self.device.close();
                }
            }
        }

        self.release();
        Err(CaptureError::Timeout(format!(
            "{} never reported frame dimensions",
            self.device.id()
        )))
    }

    /// Poll the device until it reports dimensions or `timeout` elapses.
    pub fn await_ready(&self, timeout: Duration) -> Readiness {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let deadline = self.clock.now_ms().saturating_add(timeout_ms);
        loop {
            if let Some(dimensions) = self.device.dimensions() {
                return Readiness::Ready(dimensions);
            }
            if self.clock.now_ms() >= deadline {
                return Readiness::TimedOut;
            }
            self.clock.sleep(READY_POLL);
        }
    }

    /// Stop the stream and give the device back. Safe to call at any time.
    pub fn release(&mut self) {
        if self.stream.take().is_some() {
            log::info!("camera {}: released", self.device.id());
        }
        self.device.close();
        self.lease = None;
    }

    pub fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }

    /// Current dimensions of the acquired stream, if it still reports any.
    pub fn dimensions(&self) -> Option<FrameDimensions> {
        self.stream?;
        self.device.dimensions()
    }

    /// Non-blocking read of the current frame.
    pub fn current_frame(&mut self, handle: &StreamHandle) -> FrameStatus {
        match self.stream {
            Some(current) if current.generation == handle.generation => {}
            _ => return FrameStatus::NotReady,
        }
        if self.device.stream_state() != StreamState::Live || self.device.dimensions().is_none() {
            return FrameStatus::NotReady;
        }
        match self.device.latest_frame() {
            Ok(Some(frame)) if FrameDimensions::new(frame.width, frame.height).is_some() => {
                FrameStatus::Ready(frame)
            }
            Ok(_) => FrameStatus::NotReady,
            Err(err) => {
                log::warn!("camera {}: frame read failed: {}", self.device.id(), err);
                FrameStatus::NotReady
            }
        }
    }
}

impl Drop for CaptureAdapter {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticCamera, SyntheticConfig};
    use crate::clock::{Clock, ManualClock};
    use crate::profile::{DeviceProfile, Facing};

    fn constraints() -> CaptureConstraints {
        CaptureConstraints {
            width: 64,
            height: 48,
            frame_rate: 30,
            facing: Facing::User,
        }
    }

    fn adapter(config: SyntheticConfig, clock: &ManualClock) -> (CaptureAdapter, crate::capture::SyntheticControl) {
        let camera = SyntheticCamera::new(config, clock.shared());
        let control = camera.control();
        (CaptureAdapter::new(Box::new(camera), clock.shared()), control)
    }

    #[test]
    fn acquire_waits_for_dimensions() {
        let clock = ManualClock::new(0);
        let (mut adapter, _) = adapter(
            SyntheticConfig::new("stub://adapter-warmup").with_warmup_ms(300),
            &clock,
        );

        let handle = adapter.acquire(&constraints()).unwrap();
        assert_eq!(handle.dimensions, FrameDimensions::new(64, 48).unwrap());
        assert!(clock.now_ms() >= 300);
        assert!(matches!(adapter.current_frame(&handle), FrameStatus::Ready(_)));
    }

    #[test]
    fn acquire_retries_once_then_times_out() {
        let clock = ManualClock::new(0);
        let (mut adapter, control) = adapter(
            SyntheticConfig::new("stub://adapter-timeout").with_warmup_ms(u64::MAX),
            &clock,
        );

        let err = adapter.acquire(&constraints()).unwrap_err();
        assert!(matches!(err, CaptureError::Timeout(_)));
        assert_eq!(control.opens(), READY_ATTEMPTS);
        assert!(clock.now_ms() >= 2 * READY_TIMEOUT.as_millis() as u64);
        assert!(!adapter.is_acquired());
    }

    #[test]
    fn permission_denied_releases_the_lease() {
        let clock = ManualClock::new(0);
        let (mut adapter, control) = adapter(SyntheticConfig::new("stub://adapter-denied"), &clock);
        control.deny_permission(true);

        let err = adapter.acquire(&constraints()).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));

        control.deny_permission(false);
        assert!(adapter.acquire(&constraints()).is_ok());
    }

    #[test]
    fn release_is_idempotent() {
        let clock = ManualClock::new(0);
        let (mut adapter, _) = adapter(SyntheticConfig::new("stub://adapter-release"), &clock);
        adapter.release();
        let handle = adapter.acquire(&DeviceProfile::constrained().capture).unwrap();
        adapter.release();
        adapter.release();
        assert!(matches!(adapter.current_frame(&handle), FrameStatus::NotReady));
    }

    #[test]
    fn stalled_or_paused_streams_are_not_ready() {
        let clock = ManualClock::new(0);
        let (mut adapter, control) = adapter(SyntheticConfig::new("stub://adapter-stall"), &clock);
        let handle = adapter.acquire(&constraints()).unwrap();

        control.set_stalled(true);
        assert!(matches!(adapter.current_frame(&handle), FrameStatus::NotReady));
        assert!(adapter.dimensions().is_none());

        control.set_stalled(false);
        control.set_paused(true);
        assert!(matches!(adapter.current_frame(&handle), FrameStatus::NotReady));

        control.set_paused(false);
        assert!(matches!(adapter.current_frame(&handle), FrameStatus::Ready(_)));
    }

    #[test]
    fn two_adapters_cannot_share_a_device() {
        let clock = ManualClock::new(0);
        let (mut first, _) = adapter(SyntheticConfig::new("stub://adapter-shared"), &clock);
        let (mut second, _) = adapter(SyntheticConfig::new("stub://adapter-shared"), &clock);

        first.acquire(&constraints()).unwrap();
        assert!(matches!(
            second.acquire(&constraints()),
            Err(CaptureError::DeviceUnavailable(_))
        ));

        first.release();
        assert!(second.acquire(&constraints()).is_ok());
    }
}

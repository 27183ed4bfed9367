//! Recognition session.
//!
//! A session owns one capture device, one classifier, an optional overlay surface and
//! the host callbacks, and turns the camera stream into gesture updates and actions.
//!
//! # Scheduling
//!
//! The session is a single-threaded cooperative loop. Each `poll()` call is one turn:
//!
//! 1. actions authorized during earlier turns are dispatched to `on_action`
//! 2. a loop restart requested after an action runs once it is due
//! 3. the stall watchdog runs when due
//! 4. the frame tick runs when due and the session is `Streaming`
//!
//! Actions are therefore always delivered on the turn after the frame that produced
//! them, so a slow host callback can never stall the tick that triggered it. Ticks are
//! spaced by the profile's frame interval, or the display refresh when it is zero.
//! `SessionDriver` runs turns on a dedicated thread; tests call `poll()` directly with a
//! `ManualClock`.

mod driver;
mod gate;
mod sink;
mod watchdog;

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;

pub use driver::{DriverHandle, SessionCommand, SessionDriver};
pub use gate::{CooldownGate, GateDecision};
pub use sink::{FnSink, GestureDetection, GestureSink};
pub use watchdog::{StallWatchdog, STALL_CHECK_INTERVAL_MS, STALL_FIRST_CHECK_MS};

use crate::capture::{CaptureAdapter, CaptureDevice, FrameStatus, StreamHandle, READY_TIMEOUT};
use crate::classify::{ClassifierRegistry, GestureClassifier, RunningMode};
use crate::clock::SharedClock;
use crate::error::GestureError;
use crate::overlay::{OverlayRenderer, OverlaySurface};
use crate::profile::{self, DeviceProfile, EnvironmentSignals, ProfileOverrides};

/// Tick spacing when the profile does not throttle (about 60 Hz).
pub const DISPLAY_REFRESH_MS: u64 = 16;

/// Delay between an authorized action and the loop restart that follows it.
pub const RESTART_AFTER_ACTION_MS: u64 = 500;

/// Consecutive device resets allowed before the session gives up.
pub const MAX_DEVICE_RESETS: u32 = 3;

/// Pause between releasing and re-acquiring the camera during a reset.
pub const RESET_PAUSE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Streaming,
    Suspended,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Host-provided resources bound at `initialize`.
pub struct SessionTargets {
    pub capture: Box<dyn CaptureDevice>,
    pub overlay: Option<Box<dyn OverlaySurface>>,
    pub sink: Box<dyn GestureSink>,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Registry name of the classifier, or the registry default.
    pub classifier: Option<String>,
    pub environment: EnvironmentSignals,
    pub overrides: ProfileOverrides,
    pub ready_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            classifier: None,
            environment: EnvironmentSignals::default(),
            overrides: ProfileOverrides::default(),
            ready_timeout: READY_TIMEOUT,
        }
    }
}

/// Counters for host diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub ticks: u64,
    pub frames_processed: u64,
    pub frames_not_ready: u64,
    pub frames_stale: u64,
    pub inference_errors: u64,
    /// Ticks skipped because the classifier refused video mode.
    pub mode_errors: u64,
    pub overlay_failures: u64,
    pub updates: u64,
    pub actions: u64,
    pub restarts: u64,
    pub device_resets: u64,
}

pub struct RecognitionSession {
    state: SessionState,
    clock: SharedClock,
    registry: ClassifierRegistry,
    options: SessionOptions,
    profile: DeviceProfile,
    capture: Option<CaptureAdapter>,
    classifier: Option<Box<dyn GestureClassifier>>,
    overlay: Option<Box<dyn OverlaySurface>>,
    renderer: OverlayRenderer,
    sink: Option<Box<dyn GestureSink>>,
    stream: Option<StreamHandle>,
    gate: CooldownGate,
    video_mode: bool,
    last_frame_ts: Option<u64>,
    next_tick_ms: Option<u64>,
    restart_due_ms: Option<u64>,
    pending_actions: VecDeque<GestureDetection>,
    watchdog: StallWatchdog,
    reset_attempts: u32,
    last_error: Option<GestureError>,
    stats: SessionStats,
}

impl RecognitionSession {
    /// Create an uninitialized session. Fails only on invalid profile overrides.
    pub fn new(registry: ClassifierRegistry, options: SessionOptions, clock: SharedClock) -> Result<Self> {
        let profile = profile::resolve(&options.environment, &options.overrides)?;
        Ok(Self {
            state: SessionState::Uninitialized,
            clock,
            registry,
            gate: CooldownGate::from_profile(&profile),
            profile,
            options,
            capture: None,
            classifier: None,
            overlay: None,
            renderer: OverlayRenderer::new(),
            sink: None,
            stream: None,
            video_mode: false,
            last_frame_ts: None,
            next_tick_ms: None,
            restart_due_ms: None,
            pending_actions: VecDeque::new(),
            watchdog: StallWatchdog::default(),
            reset_attempts: 0,
            last_error: None,
            stats: SessionStats::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current time on the session clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn last_error(&self) -> Option<&GestureError> {
        self.last_error.as_ref()
    }

    /// Load the classifier and bind the host resources.
    ///
    /// Calling it again on an initialized session is a no-op that reports success.
    pub fn initialize(&mut self, targets: SessionTargets) -> bool {
        if self.classifier.is_some() {
            log::debug!("session already initialized ({:?})", self.state);
            return true;
        }

        self.state = SessionState::Initializing;
        log::info!("loading gesture classifier");
        let classifier = match self.registry.load(self.options.classifier.as_deref()) {
            Ok(classifier) => classifier,
            Err(err) => {
                let err = GestureError::ClassifierInitFailure(format!("{:#}", err));
                log::error!("{}", err);
                self.last_error = Some(err);
                self.state = SessionState::Uninitialized;
                return false;
            }
        };

        self.capture = Some(
            CaptureAdapter::new(targets.capture, self.clock.clone())
                .with_ready_timeout(self.options.ready_timeout),
        );
        self.classifier = Some(classifier);
        self.overlay = targets.overlay;
        self.sink = Some(targets.sink);
        self.video_mode = false;
        self.last_error = None;
        self.state = SessionState::Ready;
        log::info!("gesture session initialized");
        true
    }

    /// Resolve the profile, acquire the camera and schedule the first tick.
    pub fn start(&mut self) -> bool {
        match self.state {
            SessionState::Uninitialized | SessionState::Initializing => {
                log::warn!("start requested before the session was initialized");
                self.last_error = Some(GestureError::NotInitialized);
                return false;
            }
            SessionState::Streaming | SessionState::Suspended => return true,
            SessionState::Ready | SessionState::Error => {}
        }
        let Some(capture) = self.capture.as_mut() else {
            self.last_error = Some(GestureError::NotInitialized);
            return false;
        };

        match profile::resolve(&self.options.environment, &self.options.overrides) {
            Ok(profile) => self.profile = profile,
            Err(err) => log::warn!("keeping previous device profile: {:#}", err),
        }
        self.gate.apply_profile(&self.profile);
        self.gate.reset();

        match capture.acquire(&self.profile.capture) {
            Ok(handle) => {
                let now = self.clock.now_ms();
                self.stream = Some(handle);
                self.last_frame_ts = None;
                self.next_tick_ms = Some(now);
                self.restart_due_ms = None;
                self.watchdog.arm(now);
                self.last_error = None;
                self.state = SessionState::Streaming;
                log::info!(
                    "gesture session streaming ({:?}, cooldown {} ms, threshold {:.2})",
                    self.profile.class,
                    self.profile.cooldown_ms,
                    self.profile.confidence_threshold
                );
                true
            }
            Err(err) => {
                capture.release();
                self.stream = None;
                self.next_tick_ms = None;
                self.watchdog.disarm();
                let err = GestureError::from(err);
                log::error!("failed to start camera: {} ({})", err, err.user_hint());
                self.last_error = Some(err);
                self.state = SessionState::Error;
                false
            }
        }
    }

    /// Cancel the loop and release the camera. Safe to call in any state.
    pub fn stop(&mut self) {
        if matches!(
            self.state,
            SessionState::Uninitialized | SessionState::Initializing
        ) {
            return;
        }
        self.next_tick_ms = None;
        self.restart_due_ms = None;
        self.watchdog.disarm();
        self.stream = None;
        if let Some(capture) = self.capture.as_mut() {
            capture.release();
        }
        if self.state != SessionState::Ready {
            log::info!("gesture session stopped");
        }
        self.state = SessionState::Ready;
    }

    /// Cancel and immediately reschedule the loop.
    ///
    /// Frame timing is reset and the latest profile overrides are applied; the
    /// cooldown state is left alone. Only a streaming session can restart.
    pub fn restart(&mut self) -> bool {
        if self.state != SessionState::Streaming {
            log::debug!("restart ignored in state {:?}", self.state);
            return false;
        }
        match profile::resolve(&self.options.environment, &self.options.overrides) {
            Ok(profile) => {
                self.gate.apply_profile(&profile);
                self.profile = profile;
            }
            Err(err) => log::warn!("keeping previous device profile: {:#}", err),
        }
        self.next_tick_ms = Some(self.clock.now_ms());
        self.restart_due_ms = None;
        self.last_frame_ts = None;
        self.stats.restarts += 1;
        log::debug!("gesture loop restarted");
        true
    }

    /// Allow the next qualifying detection to trigger immediately.
    pub fn reset_cooldown(&mut self) {
        self.gate.reset();
        log::debug!("gesture cooldown reset");
    }

    /// Host visibility changes. Hidden suspends the loop but keeps the camera.
    pub fn set_visibility(&mut self, visibility: Visibility) {
        match (visibility, self.state) {
            (Visibility::Hidden, SessionState::Streaming) => {
                self.next_tick_ms = None;
                self.state = SessionState::Suspended;
                log::info!("gesture session suspended");
            }
            (Visibility::Visible, SessionState::Suspended) => {
                self.last_frame_ts = None;
                self.next_tick_ms = Some(self.clock.now_ms());
                self.state = SessionState::Streaming;
                log::info!("gesture session resumed");
            }
            _ => {}
        }
    }

    /// Store profile overrides. They take effect on the next `start` or `restart`.
    pub fn set_device_profile(&mut self, overrides: ProfileOverrides) -> Result<()> {
        profile::resolve(&self.options.environment, &overrides)?;
        self.options.overrides = overrides;
        Ok(())
    }

    /// Replace the environment signals, e.g. after the host re-classified the device.
    /// Takes effect on the next `start` or `restart`.
    pub fn set_environment(&mut self, environment: EnvironmentSignals) -> Result<()> {
        profile::resolve(&environment, &self.options.overrides)?;
        self.options.environment = environment;
        Ok(())
    }

    /// Release and re-acquire the camera, with a fresh cooldown.
    ///
    /// Consecutive resets are capped at `MAX_DEVICE_RESETS`; past the cap the session
    /// ends in `Error` with `GestureError::ResetLimitExceeded`. A processed frame
    /// clears the count.
    ///
    /// Blocks the calling thread for `RESET_PAUSE` plus the camera readiness wait (up
    /// to two ready timeouts). A watchdog-triggered reset runs inside `poll`, so a
    /// `SessionDriver` handles no commands until it returns.
    pub fn reset_device(&mut self) -> bool {
        if self.capture.is_none() {
            self.last_error = Some(GestureError::NotInitialized);
            return false;
        }
        if self.reset_attempts >= MAX_DEVICE_RESETS {
            self.stop();
            let err = GestureError::ResetLimitExceeded {
                attempts: self.reset_attempts,
            };
            log::error!("{} ({})", err, err.user_hint());
            self.last_error = Some(err);
            self.state = SessionState::Error;
            return false;
        }

        self.reset_attempts += 1;
        self.stats.device_resets += 1;
        log::info!(
            "resetting camera (attempt {}/{})",
            self.reset_attempts,
            MAX_DEVICE_RESETS
        );
        self.stop();
        self.clock.sleep(RESET_PAUSE);
        self.reset_cooldown();
        self.start()
    }

    /// Run one scheduler turn.
    pub fn poll(&mut self) {
        self.dispatch_pending_actions();

        let now = self.clock.now_ms();
        if self.restart_due_ms.is_some_and(|due| due <= now) {
            self.restart_due_ms = None;
            self.restart();
        }

        if self.state == SessionState::Streaming && self.watchdog.due(now) {
            let stalled = self
                .capture
                .as_ref()
                .map_or(true, |capture| capture.dimensions().is_none());
            if stalled {
                log::warn!("video appears stalled, attempting camera reset");
                self.reset_device();
            }
        }

        let now = self.clock.now_ms();
        if self.state == SessionState::Streaming && self.next_tick_ms.is_some_and(|due| due <= now) {
            self.next_tick_ms = None;
            self.run_tick(now);
        }
    }

    /// Earliest clock time at which `poll` has work to do.
    pub fn next_wakeup(&self) -> Option<u64> {
        let now = self.clock.now_ms();
        let mut wake: Option<u64> = None;
        let mut consider = |at: Option<u64>| {
            if let Some(at) = at {
                wake = Some(wake.map_or(at, |w| w.min(at)));
            }
        };
        if !self.pending_actions.is_empty() {
            consider(Some(now));
        }
        consider(self.restart_due_ms);
        if self.state == SessionState::Streaming {
            consider(self.next_tick_ms);
            consider(self.watchdog.next_check_ms());
        }
        wake
    }

    fn dispatch_pending_actions(&mut self) {
        while let Some(detection) = self.pending_actions.pop_front() {
            self.stats.actions += 1;
            log::info!(
                "gesture action: {} ({:.2}, {})",
                detection.label,
                detection.confidence,
                detection.hand_side.as_str()
            );
            if let Some(sink) = self.sink.as_mut() {
                sink.on_action(&detection);
            }
        }
    }

    fn schedule_next_tick(&mut self, now: u64) {
        let interval = match self.profile.target_frame_interval_ms {
            0 => DISPLAY_REFRESH_MS,
            interval => interval,
        };
        self.next_tick_ms = Some(now.saturating_add(interval));
    }

    fn run_tick(&mut self, now: u64) {
        self.stats.ticks += 1;
        self.process_frame(now);
        self.schedule_next_tick(now);
    }

    fn process_frame(&mut self, now: u64) {
        let (Some(handle), Some(capture), Some(classifier)) = (
            self.stream,
            self.capture.as_mut(),
            self.classifier.as_deref_mut(),
        ) else {
            return;
        };

        let frame = match capture.current_frame(&handle) {
            FrameStatus::Ready(frame) => frame,
            FrameStatus::NotReady => {
                self.stats.frames_not_ready += 1;
                return;
            }
        };

        if !self.video_mode {
            if let Err(err) = classifier.set_running_mode(RunningMode::Video) {
                self.stats.mode_errors += 1;
                if self.stats.mode_errors == 1 {
                    log::warn!("classifier refused video mode: {:#}", err);
                }
                self.last_error = Some(GestureError::ClassifierInitFailure(format!(
                    "video mode rejected: {:#}",
                    err
                )));
                return;
            }
            self.video_mode = true;
        }

        if self.last_frame_ts == Some(frame.timestamp_ms) {
            self.stats.frames_stale += 1;
            return;
        }
        self.last_frame_ts = Some(frame.timestamp_ms);

        let recognition = match frame.view().run_classifier(classifier, now) {
            Ok(recognition) => recognition,
            Err(err) => {
                self.stats.inference_errors += 1;
                log::warn!("{}", GestureError::PerFrameInference(format!("{:#}", err)));
                return;
            }
        };
        self.stats.frames_processed += 1;
        self.reset_attempts = 0;

        if let Some(surface) = self.overlay.as_deref_mut() {
            if !self
                .renderer
                .draw(surface, frame.dimensions(), &recognition.landmarks)
            {
                self.stats.overlay_failures += 1;
            }
        }
        drop(frame);

        let Some(top) = recognition.top() else {
            return;
        };
        let detection = GestureDetection {
            label: top.label.clone(),
            confidence: top.confidence,
            hand_side: top.hand_side,
            timestamp_ms: now,
        };

        self.stats.updates += 1;
        if let Some(sink) = self.sink.as_mut() {
            sink.on_update(&detection);
        }

        match self.gate.evaluate(detection.confidence, now) {
            GateDecision::Trigger => {
                log::debug!("triggering action for gesture {}", detection.label);
                self.pending_actions.push_back(detection);
                self.restart_due_ms = Some(now.saturating_add(RESTART_AFTER_ACTION_MS));
            }
            GateDecision::BelowThreshold => log::debug!(
                "gesture {} below threshold ({:.2} < {:.2})",
                detection.label,
                detection.confidence,
                self.gate.confidence_threshold()
            ),
            GateDecision::CoolingDown { remaining_ms } => log::debug!(
                "gesture {} cooling down ({} ms left)",
                detection.label,
                remaining_ms
            ),
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

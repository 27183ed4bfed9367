//! Device profile resolution.
//!
//! All device-class knowledge lives here. The session and the decision gate only see
//! the resolved `DeviceProfile`.

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Viewports narrower than this count as small screens.
pub const SMALL_VIEWPORT_WIDTH: u32 = 640;

const MOBILE_PLATFORM_MARKERS: &[&str] = &["android", "iphone", "ipad", "ios", "mobi"];

/// Camera facing mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

/// Constraints passed to the capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing: Facing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Touch-first, small screen, usually less compute.
    Constrained,
    Unconstrained,
}

impl DeviceClass {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "constrained" | "mobile" => Ok(Self::Constrained),
            "unconstrained" | "desktop" => Ok(Self::Unconstrained),
            other => Err(anyhow!("unknown device class '{}'", other)),
        }
    }
}

/// Timing and quality parameters for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub cooldown_ms: u64,
    pub confidence_threshold: f32,
    /// Zero means "tick at display refresh".
    pub target_frame_interval_ms: u64,
    pub capture: CaptureConstraints,
}

impl DeviceProfile {
    pub fn unconstrained() -> Self {
        Self {
            class: DeviceClass::Unconstrained,
            cooldown_ms: 2_000,
            confidence_threshold: 0.7,
            target_frame_interval_ms: 0,
            capture: CaptureConstraints {
                width: 1280,
                height: 720,
                frame_rate: 30,
                facing: Facing::User,
            },
        }
    }

    /// Shorter cooldown and lower threshold for responsiveness, fewer frames for power.
    pub fn constrained() -> Self {
        Self {
            class: DeviceClass::Constrained,
            cooldown_ms: 1_500,
            confidence_threshold: 0.6,
            target_frame_interval_ms: 66,
            capture: CaptureConstraints {
                width: 640,
                height: 480,
                frame_rate: 15,
                facing: Facing::User,
            },
        }
    }
}

/// What the host knows about the runtime environment.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnvironmentSignals {
    pub touch_primary: bool,
    pub coarse_pointer: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub platform: String,
}

impl Default for EnvironmentSignals {
    fn default() -> Self {
        Self {
            touch_primary: false,
            coarse_pointer: false,
            viewport_width: 1280,
            viewport_height: 800,
            platform: std::env::consts::OS.to_string(),
        }
    }
}

impl EnvironmentSignals {
    pub fn classify(&self) -> DeviceClass {
        let platform = self.platform.to_ascii_lowercase();
        let mobile_platform = MOBILE_PLATFORM_MARKERS
            .iter()
            .any(|marker| platform.contains(marker));
        let small_viewport = self.viewport_width < SMALL_VIEWPORT_WIDTH;
        if small_viewport || (mobile_platform && (self.touch_primary || self.coarse_pointer)) {
            DeviceClass::Constrained
        } else {
            DeviceClass::Unconstrained
        }
    }
}

/// Explicit host overrides. Unset fields keep the class defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    pub device_class: Option<DeviceClass>,
    pub cooldown_ms: Option<u64>,
    pub confidence_threshold: Option<f32>,
    pub target_frame_interval_ms: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub facing: Option<Facing>,
}

/// Resolve a profile from environment signals and overrides.
///
/// Pure: the same inputs always give the same profile.
pub fn resolve(signals: &EnvironmentSignals, overrides: &ProfileOverrides) -> Result<DeviceProfile> {
    let class = overrides.device_class.unwrap_or_else(|| signals.classify());
    let mut profile = match class {
        DeviceClass::Constrained => DeviceProfile::constrained(),
        DeviceClass::Unconstrained => DeviceProfile::unconstrained(),
    };

    if let Some(cooldown_ms) = overrides.cooldown_ms {
        profile.cooldown_ms = cooldown_ms;
    }
    if let Some(threshold) = overrides.confidence_threshold {
        profile.confidence_threshold = threshold;
    }
    if let Some(interval) = overrides.target_frame_interval_ms {
        profile.target_frame_interval_ms = interval;
    }
    if let Some(width) = overrides.width {
        profile.capture.width = width;
    }
    if let Some(height) = overrides.height {
        profile.capture.height = height;
    }
    if let Some(frame_rate) = overrides.frame_rate {
        profile.capture.frame_rate = frame_rate;
    }
    if let Some(facing) = overrides.facing {
        profile.capture.facing = facing;
    }

    validate(&profile)?;
    Ok(profile)
}

fn validate(profile: &DeviceProfile) -> Result<()> {
    if profile.cooldown_ms == 0 {
        return Err(anyhow!("cooldown must be greater than zero"));
    }
    if !(0.0..=1.0).contains(&profile.confidence_threshold) {
        return Err(anyhow!(
            "confidence threshold {} is outside 0..=1",
            profile.confidence_threshold
        ));
    }
    if profile.capture.width == 0 || profile.capture.height == 0 {
        return Err(anyhow!("capture dimensions must be non-zero"));
    }
    if profile.capture.frame_rate == 0 {
        return Err(anyhow!("capture frame rate must be >= 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> EnvironmentSignals {
        EnvironmentSignals {
            touch_primary: true,
            coarse_pointer: true,
            viewport_width: 390,
            viewport_height: 844,
            platform: "iPhone".to_string(),
        }
    }

    fn desktop() -> EnvironmentSignals {
        EnvironmentSignals {
            platform: "linux".to_string(),
            ..EnvironmentSignals::default()
        }
    }

    #[test]
    fn small_touch_screens_are_constrained() {
        let profile = resolve(&phone(), &ProfileOverrides::default()).unwrap();
        let desktop = resolve(&desktop(), &ProfileOverrides::default()).unwrap();

        assert_eq!(profile.class, DeviceClass::Constrained);
        assert!(profile.cooldown_ms < desktop.cooldown_ms);
        assert!(profile.confidence_threshold < desktop.confidence_threshold);
        assert!(profile.target_frame_interval_ms > desktop.target_frame_interval_ms);
    }

    #[test]
    fn large_tablet_with_touch_is_constrained_by_platform() {
        let tablet = EnvironmentSignals {
            viewport_width: 1024,
            ..phone()
        };
        assert_eq!(tablet.classify(), DeviceClass::Constrained);

        let touch_laptop = EnvironmentSignals {
            touch_primary: true,
            ..desktop()
        };
        assert_eq!(touch_laptop.classify(), DeviceClass::Unconstrained);
    }

    #[test]
    fn overrides_win_over_environment() {
        let overrides = ProfileOverrides {
            device_class: Some(DeviceClass::Unconstrained),
            cooldown_ms: Some(2_500),
            confidence_threshold: Some(0.8),
            facing: Some(Facing::Environment),
            ..ProfileOverrides::default()
        };
        let profile = resolve(&phone(), &overrides).unwrap();

        assert_eq!(profile.class, DeviceClass::Unconstrained);
        assert_eq!(profile.cooldown_ms, 2_500);
        assert_eq!(profile.confidence_threshold, 0.8);
        assert_eq!(profile.capture.facing, Facing::Environment);
        assert_eq!(profile.capture.width, 1280);
    }

    #[test]
    fn resolve_is_idempotent() {
        let overrides = ProfileOverrides {
            cooldown_ms: Some(900),
            ..ProfileOverrides::default()
        };
        assert_eq!(
            resolve(&phone(), &overrides).unwrap(),
            resolve(&phone(), &overrides).unwrap()
        );
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        for overrides in [
            ProfileOverrides {
                cooldown_ms: Some(0),
                ..ProfileOverrides::default()
            },
            ProfileOverrides {
                confidence_threshold: Some(1.5),
                ..ProfileOverrides::default()
            },
            ProfileOverrides {
                frame_rate: Some(0),
                ..ProfileOverrides::default()
            },
        ] {
            assert!(resolve(&desktop(), &overrides).is_err());
        }
    }

    #[test]
    fn device_class_parses_aliases() {
        assert_eq!(DeviceClass::parse("Mobile").unwrap(), DeviceClass::Constrained);
        assert_eq!(DeviceClass::parse("desktop").unwrap(), DeviceClass::Unconstrained);
        assert!(DeviceClass::parse("watch").is_err());
    }
}

//! Gesture navigation engine.
//!
//! Turns a live camera stream into a small number of reliable navigation actions. A
//! `RecognitionSession` pulls frames from a capture device, runs a gesture classifier
//! on each new frame, draws hand landmarks on an overlay and passes the top detection
//! through a confidence/cooldown gate before a host action fires.
//!
//! # Guarantees
//!
//! 1. **No duplicate triggers**: two actions are at least one cooldown apart, unless the
//!    cooldown is explicitly reset.
//! 2. **Thresholded actions**: an action never fires below the profile's confidence
//!    threshold.
//! 3. **Decoupled feedback**: every processed detection reaches `on_update`; actions are
//!    delivered on the following scheduler turn.
//! 4. **Exclusive devices**: a camera is held by at most one session at a time and is
//!    always released on stop, reset or drop.
//! 5. **Private frames**: pixel bytes only reach a classifier, for the duration of one
//!    call, and are zeroized afterwards.
//!
//! # Module Structure
//!
//! - `profile`: device class detection and per-class timing/quality parameters
//! - `capture`: camera devices, stream lifecycle, device leases
//! - `classify`: classifier trait, registry, scripted and ONNX backends
//! - `session`: the recognition state machine, cooldown gate and threaded driver
//! - `overlay`: landmark rendering
//! - `navigation`: gesture bindings and guide-step cursor

use anyhow::{anyhow, Result};

pub mod capture;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod navigation;
pub mod overlay;
pub mod profile;
pub mod session;
pub mod ui;

pub use capture::{open_device, CaptureAdapter, CaptureDevice, CaptureError, FrameStatus, StreamHandle};
pub use classify::{
    ClassifierRegistry, GestureCandidate, GestureClassifier, HandLandmarks, HandSide, Recognition,
    RunningMode, ScriptedClassifier,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ClassifierSettings, GestureNavConfig};
pub use error::{FailureKind, GestureError};
pub use frame::{Frame, FrameDimensions, FrameView};
pub use navigation::{GestureBindings, NavigationCommand, StepCursor};
pub use overlay::{OverlayRenderer, OverlaySurface, RasterOverlay, SharedOverlay};
pub use profile::{DeviceClass, DeviceProfile, EnvironmentSignals, ProfileOverrides};
pub use session::{
    DriverHandle, FnSink, GestureDetection, GestureSink, RecognitionSession, SessionDriver,
    SessionOptions, SessionState, SessionStats, SessionTargets, Visibility,
};

/// Script replayed by the `scripted` classifier when no script file is configured:
/// a hand appears now and then and alternates between thumbs up and thumbs down.
pub const DEMO_SCRIPT: &str = r#"{
    "cycle": true,
    "steps": [
        { "idle": 90 },
        { "label": "Open_Palm", "confidence": 0.55, "hand": "Right", "repeat": 20 },
        { "label": "Thumb_Up", "confidence": 0.91, "hand": "Right", "repeat": 45 },
        { "idle": 60 },
        { "label": "Thumb_Down", "confidence": 0.84, "hand": "Left", "repeat": 45 }
    ]
}"#;

/// Registry with every classifier backend this build supports, keyed by name.
///
/// The configured classifier becomes the default. Loading is deferred until a session
/// initializes, so a bad model path surfaces as `GestureError::ClassifierInitFailure`.
pub fn classifier_registry(settings: &ClassifierSettings) -> Result<ClassifierRegistry> {
    let mut registry = ClassifierRegistry::new();

    let script_path = settings.script_path.clone();
    registry.register("scripted", move || {
        let classifier = match &script_path {
            Some(path) => ScriptedClassifier::from_json_file(path)?,
            None => ScriptedClassifier::from_json_str(DEMO_SCRIPT)?,
        };
        Ok(Box::new(classifier) as Box<dyn GestureClassifier>)
    });

    #[cfg(feature = "backend-tract")]
    {
        let model_path = settings.model_path.clone();
        let labels = settings.labels.clone();
        let (width, height) = (settings.input_width, settings.input_height);
        registry.register("tract", move || {
            let model_path = model_path
                .as_ref()
                .ok_or_else(|| anyhow!("classifier 'tract' needs a model_path"))?;
            let classifier = classify::TractClassifier::new(model_path, labels.clone(), width, height)?;
            Ok(Box::new(classifier) as Box<dyn GestureClassifier>)
        });
    }

    registry.set_default(&settings.name).map_err(|_| {
        anyhow!(
            "classifier '{}' is not available in this build (available: {})",
            settings.name,
            registry.list().join(", ")
        )
    })?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(name: &str) -> ClassifierSettings {
        GestureNavConfig {
            classifier: ClassifierSettings {
                name: name.to_string(),
                ..GestureNavConfig::default().classifier
            },
            ..GestureNavConfig::default()
        }
        .classifier
    }

    #[test]
    fn demo_script_loads() {
        let registry = classifier_registry(&settings("scripted")).unwrap();
        let classifier = registry.load(None).unwrap();
        assert_eq!(classifier.name(), "scripted");
    }

    #[test]
    fn unknown_classifier_lists_alternatives() {
        let err = classifier_registry(&settings("mediapipe"))
            .err()
            .expect("unknown classifier rejected");
        assert!(err.to_string().contains("scripted"));
    }

    #[test]
    fn missing_script_file_fails_at_load_time() {
        let mut settings = settings("scripted");
        settings.script_path = Some("/nonexistent/gesture-script.json".into());
        let registry = classifier_registry(&settings).unwrap();
        assert!(registry.load(None).is_err());
    }
}

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::classify::backend::{GestureClassifier, RunningMode};
use crate::classify::result::{
    GestureCandidate, HandLandmarks, HandSide, Landmark, Recognition, LANDMARK_COUNT,
};

/// What the scripted classifier answers for one `classify` call.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptStep {
    /// No hand in view.
    Nothing,
    /// One ranked candidate list. The first entry is the top result.
    Gestures(Vec<GestureCandidate>),
    /// The call fails with this message.
    Fail(String),
}

impl ScriptStep {
    pub fn gesture(label: &str, confidence: f32, hand_side: HandSide) -> Self {
        Self::Gestures(vec![GestureCandidate::new(label, confidence, hand_side)])
    }
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    /// Replayed from the start when the queue runs dry. Empty means "answer Nothing".
    cycle: Vec<ScriptStep>,
    mode: Option<RunningMode>,
    mode_switches: u32,
    calls: u64,
}

/// Shared handle to a scripted classifier, usable after the classifier has been moved
/// into a session.
#[derive(Clone)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    pub fn push(&self, step: ScriptStep) {
        if let Ok(mut state) = self.state.lock() {
            state.steps.push_back(step);
        }
    }

    pub fn push_gesture(&self, label: &str, confidence: f32, hand_side: HandSide) {
        self.push(ScriptStep::gesture(label, confidence, hand_side));
    }

    pub fn pending(&self) -> usize {
        self.state.lock().map(|state| state.steps.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> u64 {
        self.state.lock().map(|state| state.calls).unwrap_or(0)
    }

    pub fn mode(&self) -> Option<RunningMode> {
        self.state.lock().ok().and_then(|state| state.mode)
    }

    pub fn mode_switches(&self) -> u32 {
        self.state.lock().map(|state| state.mode_switches).unwrap_or(0)
    }
}

/// Classifier that replays a script instead of running a model.
///
/// Used by the synthetic host and by tests. It behaves like a real engine in one
/// respect that matters to the session: `classify` fails until the classifier has
/// been switched to `RunningMode::Video`.
pub struct ScriptedClassifier {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                mode: Some(RunningMode::Image),
                ..ScriptState::default()
            })),
        }
    }

    pub fn with_steps(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        let classifier = Self::new();
        let handle = classifier.handle();
        for step in steps {
            handle.push(step);
        }
        classifier
    }

    /// Load a JSON script file.
    ///
    /// ```json
    /// { "cycle": true,
    ///   "steps": [ { "idle": 30 },
    ///              { "label": "Thumb_Up", "confidence": 0.9, "hand": "Right", "repeat": 10 } ] }
    /// ```
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read classifier script {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid classifier script {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: ScriptFile = serde_json::from_str(raw)?;
        let mut steps = Vec::new();
        for entry in file.steps {
            let step = entry.to_step()?;
            for _ in 0..entry.repeat() {
                steps.push(step.clone());
            }
        }
        let classifier = Self::new();
        if let Ok(mut state) = classifier.state.lock() {
            if file.cycle {
                state.cycle = steps;
            } else {
                state.steps = steps.into();
            }
        }
        Ok(classifier)
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureClassifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("script state lock poisoned"))?;
        if state.mode != Some(mode) {
            state.mode = Some(mode);
            state.mode_switches += 1;
        }
        Ok(())
    }

    fn classify(
        &mut self,
        _pixels: &[u8],
        _width: u32,
        _height: u32,
        _timestamp_ms: u64,
    ) -> Result<Recognition> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("script state lock poisoned"))?;
        if state.mode != Some(RunningMode::Video) {
            return Err(anyhow!("classifier is not in video mode"));
        }
        state.calls += 1;

        if state.steps.is_empty() && !state.cycle.is_empty() {
            let cycle = state.cycle.clone();
            state.steps.extend(cycle);
        }
        match state.steps.pop_front().unwrap_or(ScriptStep::Nothing) {
            ScriptStep::Nothing => Ok(Recognition::empty()),
            ScriptStep::Fail(message) => Err(anyhow!(message)),
            ScriptStep::Gestures(gestures) => {
                let landmarks = gestures
                    .first()
                    .map(|top| vec![open_hand(top.hand_side)])
                    .unwrap_or_default();
                Ok(Recognition {
                    gestures,
                    landmarks,
                })
            }
        }
    }
}

/// A plausible open-hand pose so overlays have something to draw.
fn open_hand(hand_side: HandSide) -> HandLandmarks {
    let mut points = [Landmark::default(); LANDMARK_COUNT];
    points[0] = Landmark {
        x: 0.5,
        y: 0.85,
        z: 0.0,
    };
    for finger in 0..5 {
        let spread = (finger as f32 - 2.0) * 0.08;
        for joint in 0..4 {
            let reach = 0.12 + joint as f32 * 0.08;
            points[1 + finger * 4 + joint] = Landmark {
                x: 0.5 + spread * (1.0 + joint as f32 * 0.3),
                y: 0.85 - reach,
                z: 0.0,
            };
        }
    }
    HandLandmarks { points, hand_side }
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    cycle: bool,
    steps: Vec<ScriptEntry>,
}

#[derive(Debug, Deserialize)]
struct ScriptEntry {
    label: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    hand: HandSide,
    repeat: Option<u32>,
    idle: Option<u32>,
    error: Option<String>,
}

fn default_confidence() -> f32 {
    1.0
}

impl ScriptEntry {
    fn to_step(&self) -> Result<ScriptStep> {
        match (&self.label, self.idle, &self.error) {
            (Some(label), None, None) => Ok(ScriptStep::gesture(label, self.confidence, self.hand)),
            (None, Some(_), None) => Ok(ScriptStep::Nothing),
            (None, None, Some(message)) => Ok(ScriptStep::Fail(message.clone())),
            _ => Err(anyhow!(
                "script step must set exactly one of label, idle or error"
            )),
        }
    }

    fn repeat(&self) -> u32 {
        self.idle.or(self.repeat).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_frames_until_video_mode() {
        let mut classifier = ScriptedClassifier::with_steps([ScriptStep::gesture(
            "Thumb_Up",
            0.9,
            HandSide::Right,
        )]);
        assert!(classifier.classify(&[], 1, 1, 0).is_err());

        classifier.set_running_mode(RunningMode::Video).unwrap();
        let recognition = classifier.classify(&[], 1, 1, 16).unwrap();
        assert_eq!(recognition.top().unwrap().label, "Thumb_Up");
        assert_eq!(recognition.landmarks.len(), 1);
        assert_eq!(classifier.handle().mode_switches(), 1);
    }

    #[test]
    fn json_script_expands_repeats_and_cycles() {
        let mut classifier = ScriptedClassifier::from_json_str(
            r#"{ "cycle": true,
                 "steps": [ { "idle": 2 },
                            { "label": "Thumb_Down", "confidence": 0.8, "hand": "Left", "repeat": 1 } ] }"#,
        )
        .unwrap();
        classifier.set_running_mode(RunningMode::Video).unwrap();

        let labels: Vec<Option<String>> = (0..6)
            .map(|i| {
                classifier
                    .classify(&[], 1, 1, i)
                    .unwrap()
                    .top()
                    .map(|top| top.label.clone())
            })
            .collect();
        assert_eq!(
            labels,
            vec![
                None,
                None,
                Some("Thumb_Down".to_string()),
                None,
                None,
                Some("Thumb_Down".to_string())
            ]
        );
    }

    #[test]
    fn json_script_rejects_ambiguous_steps() {
        let err = ScriptedClassifier::from_json_str(
            r#"{ "steps": [ { "label": "Thumb_Up", "idle": 3 } ] }"#,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn fail_steps_surface_as_errors() {
        let mut classifier = ScriptedClassifier::with_steps([ScriptStep::Fail("bad frame".into())]);
        classifier.set_running_mode(RunningMode::Video).unwrap();
        let err = classifier.classify(&[], 1, 1, 0).err().unwrap();
        assert_eq!(err.to_string(), "bad frame");
        // Script exhausted: no hand.
        assert!(classifier.classify(&[], 1, 1, 1).unwrap().top().is_none());
    }
}

use serde::Deserialize;

/// Number of landmarks per hand (wrist plus four joints on each finger).
pub const LANDMARK_COUNT: usize = 21;

/// Which hand produced a gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum HandSide {
    Left,
    Right,
    #[default]
    Unknown,
}

impl HandSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unknown => "Unknown",
        }
    }
}

/// One ranked classifier output.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureCandidate {
    pub label: String,
    /// Score in 0..=1.
    pub confidence: f32,
    pub hand_side: HandSide,
}

impl GestureCandidate {
    pub fn new(label: impl Into<String>, confidence: f32, hand_side: HandSide) -> Self {
        Self {
            label: label.into(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            hand_side,
        }
    }
}

/// A landmark in normalized image coordinates (0..1).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub points: [Landmark; LANDMARK_COUNT],
    pub hand_side: HandSide,
}

/// Result of classifying one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recognition {
    /// Ranked highest first.
    pub gestures: Vec<GestureCandidate>,
    pub landmarks: Vec<HandLandmarks>,
}

impl Recognition {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The top-ranked candidate. Lower-ranked ones never drive actions.
    pub fn top(&self) -> Option<&GestureCandidate> {
        self.gestures.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_is_first_ranked_candidate() {
        let recognition = Recognition {
            gestures: vec![
                GestureCandidate::new("Thumb_Up", 0.8, HandSide::Right),
                GestureCandidate::new("Thumb_Down", 0.9, HandSide::Right),
            ],
            landmarks: vec![],
        };
        assert_eq!(recognition.top().unwrap().label, "Thumb_Up");
        assert!(Recognition::empty().top().is_none());
    }

    #[test]
    fn candidate_confidence_is_clamped() {
        assert_eq!(GestureCandidate::new("x", 1.7, HandSide::Unknown).confidence, 1.0);
        assert_eq!(GestureCandidate::new("x", -0.2, HandSide::Unknown).confidence, 0.0);
        assert_eq!(GestureCandidate::new("x", f32::NAN, HandSide::Unknown).confidence, 0.0);
    }
}

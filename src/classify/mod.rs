//! Gesture classifiers.
//!
//! The classifier is an external engine as far as the session is concerned: one frame
//! in, ranked gesture candidates and hand landmarks out. Backends live behind the
//! `GestureClassifier` trait and are looked up by name in a `ClassifierRegistry`.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{GestureClassifier, RunningMode};
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use backends::{ScriptStep, ScriptedClassifier, ScriptHandle};
pub use registry::ClassifierRegistry;
pub use result::{GestureCandidate, HandLandmarks, HandSide, Landmark, Recognition, LANDMARK_COUNT};

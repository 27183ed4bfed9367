pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use scripted::{ScriptHandle, ScriptStep, ScriptedClassifier};

#[cfg(feature = "backend-tract")]
pub use tract::TractClassifier;

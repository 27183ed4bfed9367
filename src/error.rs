//! Error taxonomy surfaced to the host.
//!
//! Lifecycle failures (`initialize`, `start`, device resets) are stored on the session
//! and reported as a boolean failure. Per-frame failures never leave the frame loop;
//! they are logged and the tick is skipped.

use crate::capture::CaptureError;

/// Errors reported by a recognition session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GestureError {
    /// The user or OS refused camera access.
    PermissionDenied(String),
    /// No device matches the request, or it is held by another session.
    DeviceUnavailable(String),
    /// The stream never produced frame dimensions.
    InitializationTimeout(String),
    /// The classifier could not be loaded or configured.
    ClassifierInitFailure(String),
    /// A single frame failed inference. Recovered locally.
    PerFrameInference(String),
    /// The overlay could not be drawn. Recovered locally.
    Render(String),
    /// Camera resets kept failing past the retry cap.
    ResetLimitExceeded { attempts: u32 },
    /// An operation needed an initialized session.
    NotInitialized,
}

/// What the host should tell the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    CameraPermission,
    CameraMissing,
    CameraStalled,
    Classifier,
    Transient,
}

impl GestureError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "permission_denied",
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::InitializationTimeout(_) => "initialization_timeout",
            Self::ClassifierInitFailure(_) => "classifier_init_failure",
            Self::PerFrameInference(_) => "per_frame_inference",
            Self::Render(_) => "render",
            Self::ResetLimitExceeded { .. } => "reset_limit_exceeded",
            Self::NotInitialized => "not_initialized",
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied(_) => FailureKind::CameraPermission,
            Self::DeviceUnavailable(_) => FailureKind::CameraMissing,
            Self::InitializationTimeout(_) | Self::ResetLimitExceeded { .. } => {
                FailureKind::CameraStalled
            }
            Self::ClassifierInitFailure(_) | Self::NotInitialized => FailureKind::Classifier,
            Self::PerFrameInference(_) | Self::Render(_) => FailureKind::Transient,
        }
    }

    /// Short actionable message for the host UI.
    pub fn user_hint(&self) -> &'static str {
        match self.failure_kind() {
            FailureKind::CameraPermission => "grant camera access and try again",
            FailureKind::CameraMissing => "connect a camera or close other apps using it",
            FailureKind::CameraStalled => "the camera stopped sending video; reset the camera",
            FailureKind::Classifier => "gesture recognition could not be loaded",
            FailureKind::Transient => "gesture recognition hiccuped; it will retry",
        }
    }
}

impl std::fmt::Display for GestureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied(msg)
            | Self::DeviceUnavailable(msg)
            | Self::InitializationTimeout(msg)
            | Self::ClassifierInitFailure(msg)
            | Self::PerFrameInference(msg)
            | Self::Render(msg) => write!(f, "{}: {}", self.code(), msg),
            Self::ResetLimitExceeded { attempts } => {
                write!(f, "{}: gave up after {} camera resets", self.code(), attempts)
            }
            Self::NotInitialized => write!(f, "{}: call initialize first", self.code()),
        }
    }
}

impl std::error::Error for GestureError {}

impl From<CaptureError> for GestureError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            CaptureError::DeviceUnavailable(msg) | CaptureError::Io(msg) => {
                Self::DeviceUnavailable(msg)
            }
            CaptureError::Timeout(msg) => Self::InitializationTimeout(msg),
        }
    }
}

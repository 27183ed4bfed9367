use crate::classify::HandSide;

/// The top-ranked detection of one processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureDetection {
    pub label: String,
    pub confidence: f32,
    pub hand_side: HandSide,
    /// Session clock time of the tick that produced it.
    pub timestamp_ms: u64,
}

/// Host callbacks.
///
/// `on_update` fires for every processed frame with a detection, in frame order.
/// `on_action` fires at most once per cooldown window, one turn after the frame that
/// triggered it, and never concurrently with another action.
pub trait GestureSink: Send {
    fn on_update(&mut self, detection: &GestureDetection);
    fn on_action(&mut self, detection: &GestureDetection);
}

type Callback = Box<dyn FnMut(&GestureDetection) + Send>;

/// `GestureSink` built from closures.
pub struct FnSink {
    on_action: Callback,
    on_update: Option<Callback>,
}

impl FnSink {
    pub fn new<A>(on_action: A) -> Self
    where
        A: FnMut(&GestureDetection) + Send + 'static,
    {
        Self {
            on_action: Box::new(on_action),
            on_update: None,
        }
    }

    /// Sink that only logs actions.
    pub fn logging() -> Self {
        Self::new(|detection| {
            log::info!(
                "gesture detected: {} with confidence {:.2}",
                detection.label,
                detection.confidence
            )
        })
    }

    pub fn with_update<U>(mut self, on_update: U) -> Self
    where
        U: FnMut(&GestureDetection) + Send + 'static,
    {
        self.on_update = Some(Box::new(on_update));
        self
    }
}

impl GestureSink for FnSink {
    fn on_update(&mut self, detection: &GestureDetection) {
        if let Some(on_update) = self.on_update.as_mut() {
            on_update(detection);
        }
    }

    fn on_action(&mut self, detection: &GestureDetection) {
        (self.on_action)(detection);
    }
}

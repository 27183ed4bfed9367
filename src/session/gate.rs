//! Cooldown and confidence gate.
//!
//! Turns the per-frame detection stream into discrete triggers: a detection passes
//! when it meets the confidence threshold and at least `cooldown_ms` has elapsed since
//! the previous trigger (inclusive). The trigger time is recorded inside `evaluate`,
//! before the caller gets a chance to dispatch anything.

use crate::profile::DeviceProfile;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateDecision {
    Trigger,
    BelowThreshold,
    CoolingDown { remaining_ms: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CooldownGate {
    /// `None` means armed: the next qualifying detection triggers immediately.
    last_trigger_ms: Option<u64>,
    cooldown_ms: u64,
    confidence_threshold: f32,
}

impl CooldownGate {
    pub fn new(cooldown_ms: u64, confidence_threshold: f32) -> Self {
        Self {
            last_trigger_ms: None,
            cooldown_ms,
            confidence_threshold,
        }
    }

    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(profile.cooldown_ms, profile.confidence_threshold)
    }

    /// Take new parameters from a profile. The last trigger time is kept.
    pub fn apply_profile(&mut self, profile: &DeviceProfile) {
        self.cooldown_ms = profile.cooldown_ms;
        self.confidence_threshold = profile.confidence_threshold;
    }

    pub fn evaluate(&mut self, confidence: f32, timestamp_ms: u64) -> GateDecision {
        if confidence.is_nan() || confidence < self.confidence_threshold {
            return GateDecision::BelowThreshold;
        }
        if let Some(last) = self.last_trigger_ms {
            let elapsed = timestamp_ms.saturating_sub(last);
            if elapsed < self.cooldown_ms {
                return GateDecision::CoolingDown {
                    remaining_ms: self.cooldown_ms - elapsed,
                };
            }
        }
        self.last_trigger_ms = Some(timestamp_ms);
        GateDecision::Trigger
    }

    /// Re-arm so the next qualifying detection triggers immediately.
    pub fn reset(&mut self) {
        self.last_trigger_ms = None;
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut gate = CooldownGate::new(2_000, 0.7);
        assert_eq!(gate.evaluate(0.9, 1_000), GateDecision::Trigger);
        assert_eq!(
            gate.evaluate(0.9, 2_999),
            GateDecision::CoolingDown { remaining_ms: 1 }
        );
        assert_eq!(gate.evaluate(0.9, 3_000), GateDecision::Trigger);
        assert_eq!(gate.last_trigger_ms(), Some(3_000));
    }

    #[test]
    fn below_threshold_never_triggers() {
        let mut gate = CooldownGate::new(2_000, 0.7);
        for t in [0, 10_000, 1_000_000] {
            assert_eq!(gate.evaluate(0.69, t), GateDecision::BelowThreshold);
        }
        assert_eq!(gate.last_trigger_ms(), None);
        assert_eq!(gate.evaluate(0.7, 1_000_001), GateDecision::Trigger);
    }

    #[test]
    fn nan_confidence_is_below_threshold() {
        let mut gate = CooldownGate::new(2_000, 0.7);
        assert_eq!(gate.evaluate(f32::NAN, 0), GateDecision::BelowThreshold);
        assert_eq!(gate.last_trigger_ms(), None);
        assert_eq!(gate.evaluate(0.9, 10), GateDecision::Trigger);
    }

    #[test]
    fn repeated_labels_trigger_once_cooled_down() {
        let mut gate = CooldownGate::new(500, 0.5);
        let triggers = (0..20u64)
            .filter(|i| gate.evaluate(0.8, i * 100) == GateDecision::Trigger)
            .count();
        // t = 0, 500, 1000, 1500
        assert_eq!(triggers, 4);
    }

    #[test]
    fn reset_rearms_and_profile_keeps_last_trigger() {
        let mut gate = CooldownGate::new(2_000, 0.7);
        gate.evaluate(0.9, 0);
        gate.apply_profile(&DeviceProfile::constrained());
        assert_eq!(gate.last_trigger_ms(), Some(0));
        assert_eq!(gate.cooldown_ms(), 1_500);

        gate.reset();
        assert_eq!(gate.evaluate(0.9, 600), GateDecision::Trigger);
    }

    #[test]
    fn clock_going_backwards_does_not_trigger() {
        let mut gate = CooldownGate::new(1_000, 0.5);
        gate.evaluate(0.9, 5_000);
        assert!(matches!(
            gate.evaluate(0.9, 4_000),
            GateDecision::CoolingDown { .. }
        ));
        assert_eq!(gate.last_trigger_ms(), Some(5_000));
    }
}

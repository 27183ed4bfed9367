/// First stall check after a stream starts.
pub const STALL_FIRST_CHECK_MS: u64 = 5_000;

/// Interval between later stall checks.
pub const STALL_CHECK_INTERVAL_MS: u64 = 10_000;

/// Periodic check for streams that stopped reporting dimensions.
#[derive(Clone, Debug, Default)]
pub struct StallWatchdog {
    next_check_ms: Option<u64>,
}

impl StallWatchdog {
    pub fn arm(&mut self, now_ms: u64) {
        self.next_check_ms = Some(now_ms.saturating_add(STALL_FIRST_CHECK_MS));
    }

    pub fn disarm(&mut self) {
        self.next_check_ms = None;
    }

    pub fn next_check_ms(&self) -> Option<u64> {
        self.next_check_ms
    }

    /// True when a check is due. Schedules the following one.
    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.next_check_ms {
            Some(at) if at <= now_ms => {
                self.next_check_ms = Some(now_ms.saturating_add(STALL_CHECK_INTERVAL_MS));
                true
            }
            _ => false,
        }
    }
}

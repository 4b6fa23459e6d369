//! Cooperative cadence timers.
//!
//! Each periodic job in the node (sampling, draining, broker reconnect,
//! WiFi rescan, halted-append probe) owns its own [`Cadence`].  Nothing
//! shares a "last attempt" timestamp, so changing one period never shifts
//! another job.
//!
//! ```text
//!  now_ms ──▶ Cadence::due() ──▶ job runs ──▶ Cadence::mark(now_ms)
//! ```
//!
//! Time is a monotonic millisecond counter supplied by the caller
//! (`MonotonicClock::uptime_ms` on target, a plain integer in tests).

/// A fixed-period timer driven by the caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl Cadence {
    /// A cadence that is due immediately, then every `interval_ms`.
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: interval_ms as u64,
            last_ms: None,
        }
    }

    /// Whether the job should run at `now_ms`.
    pub fn due(&self, now_ms: u64) -> bool {
        match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Record that the job ran (or was attempted) at `now_ms`.
    pub fn mark(&mut self, now_ms: u64) {
        self.last_ms = Some(now_ms);
    }

    /// Run-and-mark in one step.  Returns `true` when the job is due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if self.due(now_ms) {
            self.mark(now_ms);
            true
        } else {
            false
        }
    }

    /// Make the next [`due`](Self::due) return `true` regardless of time.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }

    /// Milliseconds until the job is due (0 if due now).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.last_ms {
            None => 0,
            Some(last) => self.interval_ms.saturating_sub(now_ms.saturating_sub(last)),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}

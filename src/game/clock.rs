//! Tic Scheduler
//!
//! Converts wall-clock time into whole simulation tics at a fixed rate.
//!
//! The scheduler keeps an anchor time and the number of tics issued since the
//! anchor, so the modeled clock advances by exactly `tics * 1000 / rate`
//! milliseconds with no rounding drift. The fractional remainder of a call is
//! carried into the next one.

/// Fixed-rate tic accumulator.
#[derive(Debug, Clone)]
pub struct TicScheduler {
    rate: u32,
    anchor_ms: i64,
    issued: u64,
}

impl TicScheduler {
    /// Create a new scheduler anchored at `now_ms`.
    pub fn new(rate: u32, now_ms: i64) -> Self {
        Self {
            rate: rate.max(1),
            anchor_ms: now_ms,
            issued: 0,
        }
    }

    /// Tics per modeled second.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Whole tics elapsed since the previous call.
    ///
    /// Returns 0 when called again within the same tic, or when the clock
    /// stepped backwards.
    pub fn elapsed_tics(&mut self, now_ms: i64) -> u32 {
        let span = now_ms - self.anchor_ms;
        if span <= 0 {
            return 0;
        }

        let rate = u64::from(self.rate);
        let total = (span as u128 * u128::from(rate) / 1000) as u64;
        let tics = total.saturating_sub(self.issued);
        self.issued = self.issued.max(total);

        // Fold whole seconds into the anchor to keep the counters small.
        let seconds = self.issued / rate;
        if seconds > 0 {
            self.anchor_ms += (seconds * 1000) as i64;
            self.issued -= seconds * rate;
        }

        u32::try_from(tics).unwrap_or(u32::MAX)
    }

    /// Re-anchor at `now_ms`, discarding any fractional remainder.
    ///
    /// Used when play starts or resumes after a pause.
    pub fn reset(&mut self, now_ms: i64) {
        self.anchor_ms = now_ms;
        self.issued = 0;
    }

    /// Modeled time of the last issued tic boundary.
    pub fn last_time_ms(&self) -> i64 {
        self.anchor_ms + (self.issued * 1000 / u64::from(self.rate)) as i64
    }
}

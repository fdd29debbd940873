//! Simulated time.
//!
//! Time is a monotonically increasing `Tick` counter.  `SimClock` maps ticks
//! to simulated milliseconds:
//!
//!   now_ms = start_ms + tick * tick_interval_ms
//!
//! Every time-dependent component downstream (cache TTL, throttle window,
//! trail timestamps) takes an explicit `now_ms` rather than reading a wall
//! clock, so runs are reproducible and expiry edges can be probed exactly.

use std::fmt;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation tick counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between tick counts and simulated milliseconds.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Simulated millisecond timestamp of tick 0.
    pub start_ms: u64,
    /// Milliseconds represented by one tick.
    pub tick_interval_ms: u64,
    /// The current tick, advanced by [`SimClock::advance`].
    pub current_tick: Tick,
}

impl SimClock {
    pub fn new(start_ms: u64, tick_interval_ms: u64) -> Self {
        Self {
            start_ms,
            tick_interval_ms,
            current_tick: Tick::ZERO,
        }
    }

    /// Advance the clock by one tick.
    #[inline]
    pub fn advance(&mut self) {
        self.current_tick = Tick(self.current_tick.0 + 1);
    }

    /// Simulated milliseconds at `current_tick`.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.ms_at(self.current_tick)
    }

    #[inline]
    pub fn ms_at(&self, tick: Tick) -> u64 {
        self.start_ms + tick.0 * self.tick_interval_ms
    }

    /// Length of one tick in seconds.
    #[inline]
    pub fn tick_secs(&self) -> f64 {
        self.tick_interval_ms as f64 / 1_000.0
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (+{} ms)", self.current_tick, self.now_ms() - self.start_ms)
    }
}

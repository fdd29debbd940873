//! Simulator configuration.

use crate::{SimError, SimResult};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Simulated milliseconds per tick.
    pub tick_interval_ms: u64,

    /// Global seed.  Each vehicle's RNG is derived from this and its id.
    pub seed: u64,

    /// Relative speed jitter per tick: speed is drawn from
    /// `base × [1 − j, 1 + j]`.  Must be in `[0, 1)`.
    pub speed_jitter: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            seed:             42,
            speed_jitter:     0.1,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(SimError::Config("tick_interval_ms must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.speed_jitter) {
            return Err(SimError::Config(format!(
                "speed_jitter must be in [0, 1), got {}",
                self.speed_jitter
            )));
        }
        Ok(())
    }
}

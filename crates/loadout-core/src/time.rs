//! Fixed-step simulation clock
//!
//! Wall-clock frame deltas are banked and paid out as whole ticks of
//! `fixed_timestep`, so reload, cooldown and despawn timers advance in the
//! same increments on the authority and on every observer.

use serde::{Deserialize, Serialize};

/// Tick length and frame clamping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Simulated seconds per tick
    pub fixed_timestep: f32,
    /// Longest frame delta that is banked; a stall beyond it is dropped
    pub max_delta_time: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_delta_time: 0.25,
        }
    }
}

/// Tick counter plus the not-yet-simulated remainder of frame time
#[derive(Debug, Clone, Default)]
pub struct GameTime {
    config: TimeConfig,
    total_time: f64,
    tick: u64,
    accumulator: f32,
}

impl GameTime {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Length of one tick in seconds
    pub fn step(&self) -> f32 {
        self.config.fixed_timestep
    }

    /// Simulated seconds since the first tick
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Ticks simulated so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Bank one frame's delta and return how many ticks are now due.
    /// A non-positive timestep never yields ticks.
    pub fn accumulate(&mut self, raw_delta: f32) -> u32 {
        if self.config.fixed_timestep <= 0.0 {
            return 0;
        }
        self.accumulator += raw_delta.clamp(0.0, self.config.max_delta_time);
        let mut due = 0;
        while self.accumulator >= self.config.fixed_timestep {
            self.accumulator -= self.config.fixed_timestep;
            due += 1;
        }
        due
    }

    /// Record one simulated tick and return its index
    pub fn advance_tick(&mut self) -> u64 {
        let index = self.tick;
        self.tick += 1;
        self.total_time += f64::from(self.config.fixed_timestep);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_time(step: f32) -> GameTime {
        GameTime::new(TimeConfig {
            fixed_timestep: step,
            ..Default::default()
        })
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut time = make_time(0.125);
        assert_eq!(time.accumulate(0.3), 2);
        assert_eq!(time.accumulate(0.2), 2);
        assert_eq!(time.accumulate(0.0), 0);
    }

    #[test]
    fn test_stall_is_clamped() {
        let mut time = make_time(0.125);
        assert_eq!(time.accumulate(10.0), 2);
        assert_eq!(time.accumulate(-1.0), 0);
    }

    #[test]
    fn test_ticks_advance_total_time() {
        let mut time = make_time(0.25);
        assert_eq!(time.advance_tick(), 0);
        assert_eq!(time.advance_tick(), 1);
        assert_eq!(time.tick(), 2);
        assert_eq!(time.total_time(), 0.5);
    }

    #[test]
    fn test_zero_timestep_never_ticks() {
        let mut time = make_time(0.0);
        assert_eq!(time.accumulate(0.1), 0);
    }
}

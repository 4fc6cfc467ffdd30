//! Presentation clock. One tick is `TICK_MILLIS`; drivers decide how
//! many ticks make up a frame.

use crate::types::{Tick, TICK_MILLIS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    pub speed:        SimSpeed,
    pub paused:       bool,
}

impl SimClock {
    /// A clock at tick 0. Paused until the simulation starts.
    pub fn new() -> Self {
        Self { current_tick: 0, speed: SimSpeed::Normal, paused: true }
    }

    /// Advance one tick. Returns the new tick number.
    /// Panics if called while paused; callers must check.
    pub fn advance(&mut self) -> Tick {
        assert!(!self.paused, "advance() called on paused clock");
        self.current_tick += 1;
        self.current_tick
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: SimSpeed) {
        self.speed = speed;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.current_tick * TICK_MILLIS
    }

    /// How many ticks a driver should run per frame.
    pub fn ticks_per_step(&self) -> u64 {
        match self.speed {
            SimSpeed::Normal  => 1,
            SimSpeed::Fast    => 10,
            SimSpeed::Instant => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimSpeed {
    #[default]
    Normal,   // 1 tick/frame: real time at 100 ms frames
    Fast,     // 10 ticks/frame: one countdown second per frame
    Instant,  // 100 ticks/frame: headless runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_at_zero() {
        let clock = SimClock::new();
        assert!(clock.paused);
        assert_eq!(clock.current_tick, 0);
    }

    #[test]
    fn elapsed_tracks_ticks() {
        let mut clock = SimClock::new();
        clock.resume();
        for _ in 0..15 {
            clock.advance();
        }
        assert_eq!(clock.elapsed_ms(), 1_500);
        clock.set_speed(SimSpeed::Fast);
        assert_eq!(clock.ticks_per_step(), 10);
    }
}

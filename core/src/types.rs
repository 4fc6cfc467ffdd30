//! Shared primitive types used across the entire simulation.

use serde::{Deserialize, Serialize};

/// A simulation tick. One tick = `TICK_MILLIS` of presentation time.
pub type Tick = u64;

/// The canonical run identifier.
pub type RunId = String;

/// Zero-based stage number.
pub type StageIndex = usize;

/// Whole currency units. Every balance and wager is integral.
pub type Amount = i64;

pub const TICK_MILLIS: u64 = 100;

/// Convert a millisecond duration to ticks, rounding up.
pub fn ms_to_ticks(ms: u64) -> Tick {
    ms.div_ceil(TICK_MILLIS)
}

/// A binary market prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Up   => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// +1.0 for Up, -1.0 for Down.
    pub fn sign(self) -> f64 {
        match self {
            Self::Up   =>  1.0,
            Self::Down => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_to_ticks_rounds_up() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(500), 5);
        assert_eq!(ms_to_ticks(501), 6);
        assert_eq!(ms_to_ticks(3000), 30);
    }

    #[test]
    fn opposite_is_an_involution() {
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Down.opposite().opposite(), Direction::Down);
    }
}

//! Seed adjustment

use serde::{Deserialize, Serialize};

/// A non-negative sampling seed
///
/// Adjustments return a new value; decrementing stops at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedState(u64);

impl SeedState {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn decrement(self) -> Self {
        Self(self.0.saturating_sub(1))
    }
}

impl From<u64> for SeedState {
    fn from(seed: u64) -> Self {
        Self(seed)
    }
}

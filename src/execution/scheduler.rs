//! Scheduling strategy - how many steps of a wave run at once

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy for scheduling step execution within a wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingStrategy {
    /// One step at a time, in declaration order
    Sequential,

    /// Every step of a wave at once
    Parallel,

    /// At most N concurrent steps (0 behaves as 1)
    LimitedParallel(usize),
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::Parallel
    }
}

impl SchedulingStrategy {
    /// Concurrency limit for a wave of the given size
    pub fn permits(&self, wave_len: usize) -> usize {
        let limit = match *self {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => wave_len,
            SchedulingStrategy::LimitedParallel(max) => max.max(1).min(wave_len),
        };
        limit.max(1)
    }
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingStrategy::Sequential => write!(f, "sequential"),
            SchedulingStrategy::Parallel => write!(f, "parallel"),
            SchedulingStrategy::LimitedParallel(n) => write!(f, "limited({})", n),
        }
    }
}

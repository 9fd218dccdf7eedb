use std::time::Duration;

/// Lower and upper bound for an exponentially growing wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationInterval {
    min: Duration,
    max: Duration,
}

impl DurationInterval {
    /// Create an interval; `max` below `min` is raised to `min`.
    pub fn of(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        let max = if max < min { min } else { max };
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Whole seconds to wait before attempt number `iteration` (0-based):
    /// `min(min * base^iteration, max)`.
    pub fn backoff_seconds(&self, iteration: u32, base: f64) -> u64 {
        let min = self.min.as_secs() as f64;
        let max = self.max.as_secs() as f64;
        let grown = min * base.powf(f64::from(iteration));
        // `as` saturates, and NaN maps to zero
        grown.min(max) as u64
    }
}

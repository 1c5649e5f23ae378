//! Randomized pauses between outbound requests.

use std::time::Duration;

use rand::Rng;

/// Uniform ranges, in seconds, for steady-state and retry delays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayPolicy {
    pub base: (f64, f64),
    /// Probability of stacking a second base draw on top of the first.
    pub long_pause_chance: f64,
    pub retry: (f64, f64),
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            base: (2.0, 5.0),
            long_pause_chance: 0.1,
            retry: (5.0, 10.0),
        }
    }
}

impl DelayPolicy {
    /// Slower pacing for when the default keeps getting blocked.
    pub fn cautious() -> Self {
        Self {
            base: (5.0, 10.0),
            long_pause_chance: 0.2,
            retry: (10.0, 15.0),
        }
    }

    /// Pacing for the single listing-page fetch and its per-container pauses.
    pub fn listing() -> Self {
        Self {
            base: (1.0, 2.0),
            long_pause_chance: 0.0,
            retry: (1.0, 3.0),
        }
    }

    /// No waiting at all.
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            base: (0.0, 0.0),
            long_pause_chance: 0.0,
            retry: (0.0, 0.0),
        }
    }

    /// Seconds to wait before a request.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let mut delay = uniform(rng, self.base);
        if self.long_pause_chance > 0.0 && rng.random_bool(self.long_pause_chance.min(1.0)) {
            delay += uniform(rng, self.base);
        }
        delay
    }

    /// Seconds to wait before retrying a failed or blocked request.
    pub fn retry_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.retry)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (min, max): (f64, f64)) -> f64 {
    if min >= max {
        return min;
    }
    rng.random_range(min..max)
}

pub fn sleep_secs(secs: f64) {
    if secs > 0.0 {
        std::thread::sleep(Duration::from_secs_f64(secs));
    }
}

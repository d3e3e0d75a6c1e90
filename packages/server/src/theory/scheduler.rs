//! SM-2 interval scheduling.

use chrono::{DateTime, Duration, Utc};
use common::ReviewAnswer;

pub const INITIAL_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;

/// Scheduling state of one card for one user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewState {
    /// Days until the next review, at least 1.
    pub interval: i32,
    pub repetitions: i32,
    pub ease_factor: f64,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self {
            interval: 1,
            repetitions: 0,
            ease_factor: INITIAL_EASE,
        }
    }
}

impl ReviewState {
    /// Apply one graded review.
    pub fn apply(self, answer: ReviewAnswer) -> Self {
        let Some(quality) = answer.quality() else {
            return Self {
                interval: 1,
                repetitions: 0,
                ease_factor: self.ease_factor.max(MIN_EASE),
            };
        };

        let q = f64::from(5 - quality);
        let ease_factor = (self.ease_factor + (0.1 - q * (0.08 + q * 0.02))).max(MIN_EASE);
        let repetitions = self.repetitions + 1;
        let interval = match repetitions {
            ..=1 => 1,
            2 => 6,
            _ => ((f64::from(self.interval) * ease_factor).round() as i32).max(1),
        };

        Self {
            interval,
            repetitions,
            ease_factor,
        }
    }

    pub fn next_review_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(i64::from(self.interval.max(1)))
    }
}

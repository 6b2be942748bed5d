//! Request pacing primitives for the online card database.
//!
//! [`MinInterval`] enforces the minimum inter-request spacing with a
//! mutex-guarded monotonic timestamp; [`CircuitBreaker`] converts runs of
//! failures into a cooldown during which online resolution is skipped
//! entirely.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum interval between requests, process-wide.
#[derive(Debug)]
pub struct MinInterval {
    min: Duration,
    next_free: Mutex<Option<Instant>>,
}

impl MinInterval {
    /// A pacer spacing requests at least `min` apart.
    #[must_use]
    pub fn new(min: Duration) -> Self {
        Self {
            min,
            next_free: Mutex::new(None),
        }
    }

    /// Reserve the next slot and return how long the caller must sleep
    /// before issuing its request. Slots are handed out in call order, so
    /// concurrent callers serialise at the configured spacing.
    pub fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut next_free = match self.next_free.lock() {
            Ok(guard) => guard,
            Err(_) => return Duration::ZERO,
        };
        let start = match *next_free {
            Some(at) if at > now => at,
            _ => now,
        };
        *next_free = Some(start + self.min);
        start.saturating_duration_since(now)
    }
}

const BREAKER_FAILURE_THRESHOLD: u32 = 5;

#[derive(Debug)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen,
}

/// Closed / open / half-open circuit breaker.
///
/// After `threshold` consecutive failures the breaker opens for the
/// cooldown. When the cooldown lapses a single probe call is admitted;
/// its outcome re-closes or re-opens the breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// A breaker with the default failure threshold.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self::with_threshold(BREAKER_FAILURE_THRESHOLD, cooldown)
    }

    /// A breaker opening after `threshold` consecutive failures.
    #[must_use]
    pub fn with_threshold(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Whether a call may proceed right now. Admits exactly one probe per
    /// lapsed cooldown.
    pub fn allow(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { until } => {
                if Instant::now() >= until {
                    *state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => false,
        }
    }

    /// Record a successful call; closes the breaker.
    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = BreakerState::Closed {
                consecutive_failures: 0,
            };
        }
    }

    /// Record a failed call; opens the breaker once the threshold is hit
    /// or immediately when probing half-open.
    pub fn record_failure(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = match *state {
                BreakerState::Closed {
                    consecutive_failures,
                } => {
                    let failures = consecutive_failures + 1;
                    if failures >= self.threshold {
                        log::warn!(
                            "card database breaker opened after {failures} consecutive failures"
                        );
                        BreakerState::Open {
                            until: Instant::now() + self.cooldown,
                        }
                    } else {
                        BreakerState::Closed {
                            consecutive_failures: failures,
                        }
                    }
                }
                BreakerState::Open { until } => BreakerState::Open { until },
                BreakerState::HalfOpen => BreakerState::Open {
                    until: Instant::now() + self.cooldown,
                },
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reservation_is_immediate() {
        let pacer = MinInterval::new(Duration::from_millis(120));
        assert_eq!(pacer.reserve(), Duration::ZERO);
    }

    #[test]
    fn back_to_back_reservations_space_out() {
        let pacer = MinInterval::new(Duration::from_millis(120));
        let first = pacer.reserve();
        let second = pacer.reserve();
        let third = pacer.reserve();
        assert_eq!(first, Duration::ZERO);
        assert!(second > Duration::from_millis(100));
        assert!(third > second);
    }

    #[test]
    fn breaker_opens_after_threshold() {
        let breaker = CircuitBreaker::with_threshold(3, Duration::from_secs(60));
        assert!(breaker.allow());
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(!breaker.allow());
    }

    #[test]
    fn success_resets_the_failure_run() {
        let breaker = CircuitBreaker::with_threshold(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(breaker.allow());
    }

    #[test]
    fn half_open_admits_one_probe() {
        let breaker = CircuitBreaker::with_threshold(1, Duration::from_millis(5));
        breaker.record_failure();
        assert!(!breaker.allow());
        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.allow(), "one probe after cooldown");
        assert!(!breaker.allow(), "only one probe until an outcome lands");
        breaker.record_success();
        assert!(breaker.allow());
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = CircuitBreaker::with_threshold(1, Duration::from_millis(5));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(breaker.allow());
        breaker.record_failure();
        assert!(!breaker.allow());
    }
}

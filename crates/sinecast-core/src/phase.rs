//! Shared phase clock
//!
//! One clock is shared by every session, so all peers observe a single global
//! phase that keeps advancing across reconnects.

use parking_lot::Mutex;

/// Default phase advance per generated sample
pub const DEFAULT_TIME_STEP: f64 = 0.1;

/// Monotonic phase counter. All mutation goes through [`PhaseClock::advance`].
#[derive(Debug)]
pub struct PhaseClock {
    time: Mutex<f64>,
    step: f64,
}

impl PhaseClock {
    pub fn new(step: f64) -> Self {
        Self {
            time: Mutex::new(0.0),
            step,
        }
    }

    /// Take the current phase and advance it by one step, as a single update
    pub fn advance(&self) -> f64 {
        let mut time = self.time.lock();
        let current = *time;
        *time += self.step;
        current
    }

    /// Snapshot of the phase the next sample will use
    pub fn current(&self) -> f64 {
        *self.time.lock()
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_starts_at_zero() {
        let clock = PhaseClock::default();
        assert_eq!(clock.current(), 0.0);
        assert_eq!(clock.advance(), 0.0);
    }

    #[test]
    fn test_each_advance_adds_exactly_one_step() {
        let clock = PhaseClock::default();
        let mut previous = clock.advance();
        for _ in 0..1_000 {
            let next = clock.advance();
            assert_eq!(next, previous + 0.1);
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_advance_returns_value_before_increment() {
        let clock = PhaseClock::new(0.25);
        assert_eq!(clock.advance(), 0.0);
        assert_eq!(clock.current(), 0.25);
        assert_eq!(clock.advance(), 0.25);
        assert_eq!(clock.current(), 0.5);
    }

    #[test]
    fn test_concurrent_advances_are_not_lost() {
        // Power-of-two step keeps the sum exact regardless of interleaving.
        let clock = Arc::new(PhaseClock::new(0.5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        clock.advance();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(clock.current(), 8.0 * 1_000.0 * 0.5);
    }

    #[test]
    fn test_concurrent_advances_hand_out_distinct_phases() {
        let clock = Arc::new(PhaseClock::new(1.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..250).map(|_| clock.advance()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen: Vec<f64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_by(|a, b| a.total_cmp(b));
        let expected: Vec<f64> = (0..1_000).map(f64::from).collect();
        assert_eq!(seen, expected);
    }
}

//! Sliding-window rate counters. One flavor serves both the per-connection
//! packet-rate gate and the three independent per-address gates (join, info,
//! list) — see SPEC_FULL.md §9.1 for why those three stay independent rather
//! than sharing one counter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateKeeper {
    limit: u32,
    window: Duration,
    events: VecDeque<Instant>,
}

impl RateKeeper {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&front) = self.events.front() {
            if now.duration_since(front) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records one event at `now` and reports whether the source is still
    /// within its limit. A `limit` of 0 disables the check entirely.
    pub fn record(&mut self, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        self.evict(now);
        self.events.push_back(now);
        self.events.len() as u32 <= self.limit
    }

    /// Current count within the window, without recording a new event.
    pub fn current_count(&mut self, now: Instant) -> u32 {
        self.evict(now);
        self.events.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let mut keeper = RateKeeper::new(10, Duration::from_secs(3));
        let base = Instant::now();
        for _ in 0..10 {
            assert!(keeper.record(base));
        }
        // 11th event within the same instant breaches the limit.
        assert!(!keeper.record(base));
    }

    #[test]
    fn old_events_fall_out_of_the_window() {
        let mut keeper = RateKeeper::new(1, Duration::from_millis(100));
        let base = Instant::now();
        assert!(keeper.record(base));
        assert!(!keeper.record(base));
        let later = base + Duration::from_millis(150);
        assert!(keeper.record(later));
    }

    #[test]
    fn zero_limit_disables_the_check() {
        let mut keeper = RateKeeper::new(0, Duration::from_secs(3));
        let base = Instant::now();
        for _ in 0..1000 {
            assert!(keeper.record(base));
        }
    }
}

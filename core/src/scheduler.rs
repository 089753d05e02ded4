//! Rate to tick conversion
//!
//! A target rate is turned into a tick interval and a burst size per tick.
//! The interval is floored at [`MIN_INTERVAL`]; above 100 RPS the interval
//! stays at the floor and the burst grows instead.

use std::num::NonZeroU64;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Shortest tick interval the dispatch loops will use
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Convert a target rate into `(tick_interval, per_tick_count)`
///
/// `per_tick_count` is `target_rps / ticks_per_second`, truncated.
pub fn calculate_interval(target_rps: NonZeroU64) -> (Duration, u64) {
    let plan = TickPlan::new(target_rps);
    (plan.interval, plan.per_tick)
}

/// Tick schedule for one target rate
///
/// Carries the per-second remainder that integer division drops from
/// `per_tick` and hands it out one extra dispatch at a time, so a full second
/// of bursts adds up to exactly `rps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickPlan {
    /// Target requests per second
    pub rps: u64,
    /// Time between ticks
    pub interval: Duration,
    /// Base number of dispatches per tick
    pub per_tick: u64,
    ticks_per_second: u64,
    remainder: u64,
    carry: u64,
}

impl TickPlan {
    /// Build the plan for `rps`
    pub fn new(rps: NonZeroU64) -> Self {
        let rps = rps.get();
        let interval_nanos = (NANOS_PER_SEC / rps).max(MIN_INTERVAL.as_nanos() as u64);
        let ticks_per_second = NANOS_PER_SEC / interval_nanos;

        Self {
            rps,
            interval: Duration::from_nanos(interval_nanos),
            per_tick: rps / ticks_per_second,
            ticks_per_second,
            remainder: rps % ticks_per_second,
            carry: 0,
        }
    }

    /// Number of ticks in one second
    pub fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    /// Dispatches for the next tick
    pub fn next_burst(&mut self) -> u64 {
        self.carry += self.remainder;
        if self.carry >= self.ticks_per_second {
            self.carry -= self.ticks_per_second;
            self.per_tick + 1
        } else {
            self.per_tick
        }
    }

    /// A fresh ticker for this plan; the first tick completes immediately
    pub fn ticker(&self) -> Interval {
        self.ticker_at(Instant::now())
    }

    /// A ticker for this plan whose first tick completes at `start`
    pub fn ticker_at(&self, start: Instant) -> Interval {
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }
}

//! Ramping-rate phase execution
//!
//! Two loops run side by side for one phase:
//!
//! 1. The rate loop ticks once per second and advances a [`RampState`].
//!    Each new rate is published on a `watch` channel.
//! 2. The dispatch loop fires bursts at the published rate. When a new rate
//!    arrives it rebuilds its [`TickPlan`] and restarts its ticker.
//!
//! The rate loop is the only writer and the dispatch loop the only reader.
//! Both loops share one origin, so rate changes land on the dispatch grid.
//! If the old rate already fired the burst for a boundary, the new ticker
//! starts one interval later instead of firing a second burst.
//! A step that takes the rate to zero or below ends the phase early with
//! [`PhaseEnd::RateExhausted`].

use async_trait::async_trait;
use std::num::NonZeroU64;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::phase::{Phase, PhaseKind};
use crate::scheduler::TickPlan;

use super::dispatch::{Capabilities, Dispatcher, DrainReport};
use super::stats::{PhaseEnd, PhaseStats};
use super::{LoadExecutor, PhaseClock};

const RATE_UPDATE_PERIOD: Duration = Duration::from_secs(1);

/// Timer resolution; ticks this close to a rate change count as the same boundary
const BOUNDARY_SLACK: Duration = Duration::from_millis(1);

/// Rate published by the rate loop, with the boundary it takes effect at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateUpdate {
    rps: NonZeroU64,
    at: Instant,
}

/// Result of one rate loop tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampStep {
    /// Rate unchanged (first tick, end reached, or zero step)
    Hold,
    /// Rate moved to a new positive value
    Changed(NonZeroU64),
    /// Rate dropped to zero or below
    Exhausted,
}

/// Runtime rate state of one ramping phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampState {
    current_rps: i64,
    end_rps: i64,
    step: i64,
    incrementing: bool,
    has_ticked: bool,
}

impl RampState {
    /// Initial state for `phase`; a zero start rate is raised to 1
    pub fn new(phase: &Phase) -> Self {
        let start = i64::try_from(phase.start_rps).unwrap_or(i64::MAX).max(1);
        Self {
            current_rps: start,
            end_rps: i64::try_from(phase.end_rps).unwrap_or(i64::MAX),
            step: phase.step,
            incrementing: phase.step > 0,
            has_ticked: false,
        }
    }

    /// Current target rate
    pub fn current(&self) -> i64 {
        self.current_rps
    }

    /// Current target rate, if it is positive
    pub fn rate(&self) -> Option<NonZeroU64> {
        u64::try_from(self.current_rps).ok().and_then(NonZeroU64::new)
    }

    /// Whether the ramp has arrived at (or passed) its end rate
    pub fn reached_end(&self) -> bool {
        if self.incrementing {
            self.current_rps >= self.end_rps
        } else {
            self.current_rps <= self.end_rps
        }
    }

    /// Advance by one rate period
    ///
    /// The first call never moves the rate.
    pub fn advance(&mut self) -> RampStep {
        if !self.has_ticked {
            self.has_ticked = true;
            return RampStep::Hold;
        }
        if self.step == 0 || self.reached_end() {
            return RampStep::Hold;
        }

        self.current_rps = self.current_rps.saturating_add(self.step);
        match self.rate() {
            Some(rps) => RampStep::Changed(rps),
            None => RampStep::Exhausted,
        }
    }
}

/// Executes a phase whose RPS changes by `step` every second
///
/// Once stopped, an executor stays stopped: a later `execute` returns
/// immediately.
pub struct RampingExecutor<Req, Resp> {
    dispatcher: Dispatcher<Req, Resp>,
    stop: CancellationToken,
}

impl<Req, Resp> RampingExecutor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a new ramping executor
    pub fn new(capabilities: Capabilities<Req, Resp>, max_in_flight: Option<usize>) -> Self {
        Self {
            dispatcher: Dispatcher::new(capabilities, max_in_flight),
            stop: CancellationToken::new(),
        }
    }

    /// Rate loop: returns `true` if the ramp exhausted itself
    async fn update_rate(
        &self,
        clock: &PhaseClock,
        mut state: RampState,
        rate_tx: watch::Sender<RateUpdate>,
        phase: &str,
    ) -> bool {
        let origin = rate_tx.borrow().at;
        let mut ticker = tokio::time::interval_at(origin, RATE_UPDATE_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exhausted = loop {
            tokio::select! {
                biased;

                _ = clock.ended() => break false,

                at = ticker.tick() => match state.advance() {
                    RampStep::Hold => {}
                    RampStep::Changed(rps) => {
                        tracing::debug!(phase, rps = rps.get(), "Ramp rate changed");
                        rate_tx.send_replace(RateUpdate { rps, at });
                    }
                    RampStep::Exhausted => {
                        tracing::info!(
                            phase,
                            rps = state.current(),
                            "Ramp rate reached zero, ending phase"
                        );
                        break true;
                    }
                },
            }
        };

        clock.end();
        exhausted
    }

    /// Dispatch loop: fires bursts at the latest published rate
    async fn dispatch(
        &self,
        clock: &PhaseClock,
        parent: &CancellationToken,
        mut rate_rx: watch::Receiver<RateUpdate>,
        stats: &mut PhaseStats,
    ) {
        let initial = *rate_rx.borrow_and_update();
        let mut plan = TickPlan::new(initial.rps);
        let mut ticker = plan.ticker_at(initial.at);
        let mut last_tick: Option<Instant> = None;
        stats.observe_rate(initial.rps);

        loop {
            tokio::select! {
                biased;

                _ = clock.ended() => break,

                changed = rate_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let update = *rate_rx.borrow_and_update();
                    plan = TickPlan::new(update.rps);
                    let fired_at_boundary =
                        last_tick.is_some_and(|last| last + BOUNDARY_SLACK >= update.at);
                    ticker = match last_tick {
                        Some(last) if fired_at_boundary => plan.ticker_at(last + plan.interval),
                        _ => plan.ticker_at(update.at),
                    };
                    stats.observe_rate(update.rps);
                    tracing::debug!(
                        phase = %stats.name,
                        rps = plan.rps,
                        interval_ms = plan.interval.as_secs_f64() * 1000.0,
                        per_tick = plan.per_tick,
                        fired_at_boundary,
                        "Dispatch ticker restarted"
                    );
                }

                at = ticker.tick() => {
                    last_tick = Some(at);
                    let burst = plan.next_burst();
                    let (launched, shed) = self.dispatcher.fire(burst, parent);
                    stats.record_tick(launched, shed);
                }
            }
        }

        clock.end();
    }
}

#[async_trait]
impl<Req, Resp> LoadExecutor for RampingExecutor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn execute(&self, parent: &CancellationToken, phase: &Phase) -> PhaseStats {
        let mut stats = PhaseStats::new(&phase.name, PhaseKind::Ramping);
        stats.start();

        let clock = PhaseClock::start(parent, &self.stop, phase.duration);
        let state = RampState::new(phase);
        let Some(initial) = state.rate() else {
            stats.finish(PhaseEnd::RateExhausted);
            return stats;
        };

        tracing::info!(
            phase = %phase.name,
            start_rps = initial.get(),
            end_rps = phase.end_rps,
            step = phase.step,
            duration_ms = phase.duration.as_millis() as u64,
            "Ramping phase started"
        );

        let (rate_tx, rate_rx) = watch::channel(RateUpdate {
            rps: initial,
            at: Instant::now(),
        });
        let (exhausted, ()) = tokio::join!(
            self.update_rate(&clock, state, rate_tx, &phase.name),
            self.dispatch(&clock, parent, rate_rx, &mut stats),
        );

        let end = if exhausted {
            PhaseEnd::RateExhausted
        } else {
            clock.reason()
        };
        stats.finish(end);

        tracing::info!(
            phase = %phase.name,
            end = %stats.end,
            dispatched = stats.dispatched,
            shed = stats.shed,
            peak_rps = stats.peak_rps,
            in_flight = self.dispatcher.in_flight(),
            "Ramping phase finished"
        );

        stats
    }

    fn stop(&self) {
        self.stop.cancel();
    }

    fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    async fn drain(&self, timeout: Duration) -> DrainReport {
        self.dispatcher.drain(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: u64, end: u64, step: i64) -> Phase {
        Phase::ramping("ramp", Duration::ZERO, Duration::from_secs(10), start, end, step)
    }

    fn rates(state: &mut RampState, ticks: usize) -> Vec<RampStep> {
        (0..ticks).map(|_| state.advance()).collect()
    }

    fn changed(rps: u64) -> RampStep {
        RampStep::Changed(NonZeroU64::new(rps).unwrap())
    }

    #[test]
    fn test_first_tick_holds() {
        let mut state = RampState::new(&ramp(1, 3, 1));
        assert_eq!(state.advance(), RampStep::Hold);
        assert_eq!(state.current(), 1);
    }

    #[test]
    fn test_increment_stops_at_end() {
        let mut state = RampState::new(&ramp(1, 3, 1));
        assert_eq!(
            rates(&mut state, 5),
            vec![RampStep::Hold, changed(2), changed(3), RampStep::Hold, RampStep::Hold]
        );
    }

    #[test]
    fn test_decrement_stops_at_end() {
        let mut state = RampState::new(&ramp(3, 1, -1));
        assert_eq!(
            rates(&mut state, 4),
            vec![RampStep::Hold, changed(2), changed(1), RampStep::Hold]
        );
    }

    #[test]
    fn test_zero_start_is_floored() {
        let state = RampState::new(&ramp(0, 2, 1));
        assert_eq!(state.current(), 1);
        assert_eq!(state.rate(), NonZeroU64::new(1));
    }

    #[test]
    fn test_large_negative_step_exhausts() {
        let mut state = RampState::new(&ramp(2, 0, -3));
        assert_eq!(rates(&mut state, 2), vec![RampStep::Hold, RampStep::Exhausted]);
        assert_eq!(state.current(), -1);
    }

    #[test]
    fn test_step_may_overshoot_end_once() {
        let mut state = RampState::new(&ramp(2, 10, 3));
        assert_eq!(
            rates(&mut state, 5),
            vec![RampStep::Hold, changed(5), changed(8), changed(11), RampStep::Hold]
        );
    }

    #[test]
    fn test_zero_step_holds() {
        let mut state = RampState::new(&ramp(5, 1, 0));
        assert_eq!(rates(&mut state, 3), vec![RampStep::Hold; 3]);
    }
}

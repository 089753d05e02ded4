//! Fixed-rate phase execution

use async_trait::async_trait;
use std::num::NonZeroU64;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::phase::{Phase, PhaseKind};
use crate::scheduler::TickPlan;

use super::dispatch::{Capabilities, Dispatcher, DrainReport};
use super::stats::PhaseStats;
use super::{LoadExecutor, PhaseClock};

/// Executes a phase at a constant RPS
///
/// Once stopped, an executor stays stopped: a later `execute` returns
/// immediately.
pub struct ConstantExecutor<Req, Resp> {
    dispatcher: Dispatcher<Req, Resp>,
    stop: CancellationToken,
}

impl<Req, Resp> ConstantExecutor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a new constant executor
    pub fn new(capabilities: Capabilities<Req, Resp>, max_in_flight: Option<usize>) -> Self {
        Self {
            dispatcher: Dispatcher::new(capabilities, max_in_flight),
            stop: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl<Req, Resp> LoadExecutor for ConstantExecutor<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn execute(&self, parent: &CancellationToken, phase: &Phase) -> PhaseStats {
        let mut stats = PhaseStats::new(&phase.name, PhaseKind::Constant);
        stats.start();

        let clock = PhaseClock::start(parent, &self.stop, phase.duration);

        let Some(rps) = NonZeroU64::new(phase.start_rps) else {
            tracing::info!(phase = %phase.name, "Zero rate, phase idles until it ends");
            clock.ended().await;
            stats.finish(clock.reason());
            return stats;
        };

        let mut plan = TickPlan::new(rps);
        let mut ticker = plan.ticker();
        stats.observe_rate(rps);

        tracing::info!(
            phase = %phase.name,
            rps = plan.rps,
            interval_ms = plan.interval.as_secs_f64() * 1000.0,
            per_tick = plan.per_tick,
            duration_ms = phase.duration.as_millis() as u64,
            "Constant phase started"
        );

        loop {
            tokio::select! {
                biased;

                _ = clock.ended() => break,

                _ = ticker.tick() => {
                    let burst = plan.next_burst();
                    let (launched, shed) = self.dispatcher.fire(burst, parent);
                    stats.record_tick(launched, shed);
                }
            }
        }

        stats.finish(clock.reason());
        tracing::info!(
            phase = %phase.name,
            end = %stats.end,
            dispatched = stats.dispatched,
            shed = stats.shed,
            in_flight = self.dispatcher.in_flight(),
            "Constant phase finished"
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

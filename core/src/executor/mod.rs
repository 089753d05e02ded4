//! Phase executors
//!
//! An executor drives one [`Phase`] from start to finish: it turns the
//! phase's target rate into ticks via [`TickPlan`](crate::scheduler::TickPlan)
//! and fires a burst of dispatch tasks on every tick.
//!
//! - [`ConstantExecutor`] holds one rate for the whole phase.
//! - [`RampingExecutor`] runs a once-per-second rate update loop beside the
//!   dispatch loop and restarts the dispatch ticker whenever the rate moves.
//!
//! A phase ends on whichever comes first: its own duration, cancellation of
//! the parent token handed to `execute`, or [`LoadExecutor::stop`].
//! `execute` returns without waiting for the dispatches it fired; the caller
//! joins them with [`LoadExecutor::drain`].
//!
//! # Example
//!
//! ```ignore
//! let executor = executor_for(phase.kind, capabilities, &DispatchConfig::default());
//! let stats = executor.execute(&deadline, &phase).await;
//! let drained = executor.drain(Duration::from_secs(30)).await;
//! ```

mod constant;
mod dispatch;
mod ramping;
mod stats;

pub use constant::ConstantExecutor;
pub use dispatch::{Capabilities, Dispatcher, DrainReport};
pub use ramping::{RampState, RampStep, RampingExecutor};
pub use stats::{PhaseEnd, PhaseStats};

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::phase::{Phase, PhaseKind};

/// Runs one phase of a workload
#[async_trait]
pub trait LoadExecutor: Send + Sync {
    /// Run `phase` until its duration elapses, `parent` is cancelled or
    /// [`stop`](Self::stop) is called
    async fn execute(&self, parent: &CancellationToken, phase: &Phase) -> PhaseStats;

    /// Stop the running phase. Safe to call any number of times.
    fn stop(&self);

    /// Dispatch tasks that have not finished yet
    fn in_flight(&self) -> usize;

    /// Wait up to `timeout` for outstanding dispatch tasks
    async fn drain(&self, timeout: Duration) -> DrainReport;
}

/// Build the executor matching `kind`
pub fn executor_for<Req, Resp>(
    kind: PhaseKind,
    capabilities: Capabilities<Req, Resp>,
    dispatch: &DispatchConfig,
) -> Box<dyn LoadExecutor>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    match kind {
        PhaseKind::Constant => {
            Box::new(ConstantExecutor::new(capabilities, dispatch.max_in_flight))
        }
        PhaseKind::Ramping => Box::new(RampingExecutor::new(capabilities, dispatch.max_in_flight)),
    }
}

/// The three ways a phase can end, combined
///
/// `token` is a child of the parent token; loops of the same phase cancel it
/// to take their siblings down with them.
pub(crate) struct PhaseClock {
    parent: CancellationToken,
    token: CancellationToken,
    stop: CancellationToken,
    deadline: Instant,
}

impl PhaseClock {
    pub(crate) fn start(
        parent: &CancellationToken,
        stop: &CancellationToken,
        duration: Duration,
    ) -> Self {
        let now = Instant::now();
        // far enough out that no run will reach it
        let deadline = now
            .checked_add(duration)
            .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365));

        Self {
            parent: parent.clone(),
            token: parent.child_token(),
            stop: stop.clone(),
            deadline,
        }
    }

    /// Resolves once the phase should stop
    pub(crate) async fn ended(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = self.stop.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    /// End the phase for every loop watching this clock
    pub(crate) fn end(&self) {
        self.token.cancel();
    }

    pub(crate) fn reason(&self) -> PhaseEnd {
        if self.stop.is_cancelled() {
            PhaseEnd::Stopped
        } else if self.parent.is_cancelled() {
            PhaseEnd::Cancelled
        } else {
            PhaseEnd::Completed
        }
    }
}

#[cfg(test)]
mod tests;

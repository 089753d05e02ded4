//! Fire-and-track dispatch of individual requests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::traits::{DataSupplier, Invoker, ResultSink};

/// The invoker, supplier and sink a run is wired with
pub struct Capabilities<Req, Resp> {
    /// Performs calls
    pub invoker: Arc<dyn Invoker<Req, Resp>>,
    /// Produces request payloads
    pub supplier: Arc<dyn DataSupplier<Req>>,
    /// Receives responses
    pub sink: Arc<dyn ResultSink<Resp>>,
}

impl<Req, Resp> Capabilities<Req, Resp> {
    /// Bundle the three capabilities
    pub fn new(
        invoker: Arc<dyn Invoker<Req, Resp>>,
        supplier: Arc<dyn DataSupplier<Req>>,
        sink: Arc<dyn ResultSink<Resp>>,
    ) -> Self {
        Self {
            invoker,
            supplier,
            sink,
        }
    }
}

impl<Req, Resp> Clone for Capabilities<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            invoker: Arc::clone(&self.invoker),
            supplier: Arc::clone(&self.supplier),
            sink: Arc::clone(&self.sink),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    shed: AtomicU64,
}

/// Outcome of waiting for a phase's outstanding dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Dispatches that ran to completion
    pub completed: u64,
    /// Dispatches still running when the drain timeout hit
    pub abandoned: u64,
    /// Time spent waiting
    pub waited: Duration,
}

/// Launches dispatch tasks and keeps track of them
///
/// Each dispatch asks the supplier for a request, hands it to the invoker
/// and forwards the response to the sink. Tasks are not awaited when they
/// are fired; [`Dispatcher::drain`] joins them later. With an in-flight
/// limit, dispatches that find no free slot are shed instead of queued so
/// the tick loop never blocks.
pub struct Dispatcher<Req, Resp> {
    capabilities: Capabilities<Req, Resp>,
    gate: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl<Req, Resp> Dispatcher<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a dispatcher, optionally bounded to `max_in_flight` tasks
    pub fn new(capabilities: Capabilities<Req, Resp>, max_in_flight: Option<usize>) -> Self {
        Self {
            capabilities,
            gate: max_in_flight.map(|limit| Arc::new(Semaphore::new(limit))),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Launch up to `count` dispatch tasks
    ///
    /// Returns `(launched, shed)`.
    pub fn fire(&self, count: u64, cancel: &CancellationToken) -> (u64, u64) {
        self.tracker.reopen();

        let mut launched = 0;
        for _ in 0..count {
            let permit = match &self.gate {
                Some(gate) => match Arc::clone(gate).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => break,
                },
                None => None,
            };

            let invoker = Arc::clone(&self.capabilities.invoker);
            let supplier = Arc::clone(&self.capabilities.supplier);
            let sink = Arc::clone(&self.capabilities.sink);
            let counters = Arc::clone(&self.counters);
            let cancel = cancel.clone();

            self.tracker.spawn(async move {
                let _permit = permit;
                let request = supplier.next();
                let response = invoker.call(request, cancel).await;
                sink.collect(response);
                counters.completed.fetch_add(1, Ordering::Relaxed);
            });
            launched += 1;
        }

        let shed = count - launched;
        self.counters.dispatched.fetch_add(launched, Ordering::Relaxed);
        if shed > 0 {
            self.counters.shed.fetch_add(shed, Ordering::Relaxed);
            tracing::debug!(
                shed,
                in_flight = self.in_flight(),
                "In-flight limit reached, shedding dispatches"
            );
        }

        (launched, shed)
    }

    /// Dispatch tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Total dispatch tasks launched
    pub fn dispatched(&self) -> u64 {
        self.counters.dispatched.load(Ordering::Relaxed)
    }

    /// Dispatch tasks that delivered a response to the sink
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    /// Dispatches dropped by the in-flight limit
    pub fn shed(&self) -> u64 {
        self.counters.shed.load(Ordering::Relaxed)
    }

    /// Wait up to `timeout` for every launched dispatch to finish
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let start = Instant::now();
        self.tracker.close();

        let abandoned = match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => 0,
            Err(_) => {
                let abandoned = self.in_flight() as u64;
                tracing::warn!(
                    abandoned,
                    timeout_ms = timeout.as_millis() as u64,
                    "Drain timed out with dispatches still in flight"
                );
                abandoned
            }
        };

        DrainReport {
            completed: self.completed(),
            abandoned,
            waited: start.elapsed(),
        }
    }
}

//! Mock capabilities shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::executor::Capabilities;
use crate::traits::{DataSupplier, Invoker, ResultSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockRequest {
    pub id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockResponse {
    pub id: usize,
    pub cancelled: bool,
}

// ============================================================================
// Mock Invoker
// ============================================================================

pub(crate) struct MockInvoker {
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Invoker<MockRequest, MockResponse> for MockInvoker {
    async fn call(&self, request: MockRequest, cancel: CancellationToken) -> MockResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let cancelled = match self.delay {
            Some(delay) => tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = cancel.cancelled() => true,
            },
            None => false,
        };

        MockResponse {
            id: request.id,
            cancelled,
        }
    }
}

// ============================================================================
// Mock Supplier
// ============================================================================

#[derive(Default)]
pub(crate) struct MockSupplier {
    counter: AtomicUsize,
}

impl DataSupplier<MockRequest> for MockSupplier {
    fn next(&self) -> MockRequest {
        MockRequest {
            id: self.counter.fetch_add(1, Ordering::SeqCst),
        }
    }
}

// ============================================================================
// Mock Sink
// ============================================================================

#[derive(Default)]
pub(crate) struct MockSink {
    results: Mutex<Vec<MockResponse>>,
    finalized: AtomicUsize,
    collected_after_finalize: AtomicUsize,
}

impl MockSink {
    pub fn collected(&self) -> usize {
        self.results.lock().unwrap().len()
    }

    pub fn cancelled(&self) -> usize {
        self.results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.cancelled)
            .count()
    }

    pub fn finalize_count(&self) -> usize {
        self.finalized.load(Ordering::SeqCst)
    }

    pub fn late_collects(&self) -> usize {
        self.collected_after_finalize.load(Ordering::SeqCst)
    }
}

impl ResultSink<MockResponse> for MockSink {
    fn collect(&self, response: MockResponse) {
        if self.finalized.load(Ordering::SeqCst) > 0 {
            self.collected_after_finalize.fetch_add(1, Ordering::SeqCst);
        }
        self.results.lock().unwrap().push(response);
    }

    fn finalize(&self) {
        self.finalized.fetch_add(1, Ordering::SeqCst);
    }
}

/// Wire a mock triple, returning handles for assertions
pub(crate) fn capabilities(
    invoker: MockInvoker,
) -> (
    Capabilities<MockRequest, MockResponse>,
    Arc<MockInvoker>,
    Arc<MockSink>,
) {
    let invoker = Arc::new(invoker);
    let sink = Arc::new(MockSink::default());
    let caps = Capabilities::new(
        invoker.clone(),
        Arc::new(MockSupplier::default()),
        sink.clone(),
    );
    (caps, invoker, sink)
}

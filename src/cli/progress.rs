//! Live progress for `run`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use loadgen_core::{DataSupplier, ResultSink};
use tokio::task::JoinHandle;

/// Request counters shared by the wrappers below
#[derive(Debug, Default)]
pub struct Progress {
    sent: AtomicU64,
    done: AtomicU64,
}

impl Progress {
    /// Requests handed to the invoker
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Responses handed to the sink
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Requests still waiting for a response
    pub fn in_flight(&self) -> u64 {
        self.sent().saturating_sub(self.done())
    }
}

/// Counts every request drawn from the inner supplier
pub struct CountingSupplier<Req> {
    inner: Arc<dyn DataSupplier<Req>>,
    progress: Arc<Progress>,
}

impl<Req> CountingSupplier<Req> {
    pub fn new(inner: Arc<dyn DataSupplier<Req>>, progress: Arc<Progress>) -> Self {
        Self { inner, progress }
    }
}

impl<Req> DataSupplier<Req> for CountingSupplier<Req> {
    fn next(&self) -> Req {
        self.progress.sent.fetch_add(1, Ordering::Relaxed);
        self.inner.next()
    }
}

/// Counts every response passed on to the inner sink
pub struct CountingSink<Resp> {
    inner: Arc<dyn ResultSink<Resp>>,
    progress: Arc<Progress>,
}

impl<Resp> CountingSink<Resp> {
    pub fn new(inner: Arc<dyn ResultSink<Resp>>, progress: Arc<Progress>) -> Self {
        Self { inner, progress }
    }
}

impl<Resp> ResultSink<Resp> for CountingSink<Resp> {
    fn collect(&self, response: Resp) {
        self.inner.collect(response);
        self.progress.done.fetch_add(1, Ordering::Relaxed);
    }

    fn finalize(&self) {
        self.inner.finalize();
    }
}

/// Spinner that redraws the counters until aborted
pub struct Spinner {
    bar: ProgressBar,
    refresh: JoinHandle<()>,
}

impl Spinner {
    pub fn start(progress: Arc<Progress>) -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let refresh = {
            let bar = bar.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(250));
                loop {
                    ticker.tick().await;
                    bar.set_message(format!(
                        "sent {} | done {} | in flight {}",
                        progress.sent(),
                        progress.done(),
                        progress.in_flight()
                    ));
                }
            })
        };

        Ok(Self { bar, refresh })
    }

    pub fn finish(self, message: &str) {
        self.refresh.abort();
        self.bar.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgen_samplers::FixedSupplier;
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecSink {
        items: Mutex<Vec<u32>>,
    }

    impl ResultSink<u32> for VecSink {
        fn collect(&self, response: u32) {
            self.items.lock().unwrap().push(response);
        }

        fn finalize(&self) {}
    }

    #[test]
    fn test_counters() {
        let progress = Arc::new(Progress::default());
        let supplier =
            CountingSupplier::new(Arc::new(FixedSupplier::new(7u32)), Arc::clone(&progress));
        let inner = Arc::new(VecSink::default());
        let sink = CountingSink::new(inner.clone(), Arc::clone(&progress));

        let a = supplier.next();
        let _ = supplier.next();
        sink.collect(a);

        assert_eq!(progress.sent(), 2);
        assert_eq!(progress.done(), 1);
        assert_eq!(progress.in_flight(), 1);
        assert_eq!(*inner.items.lock().unwrap(), vec![7]);
    }
}

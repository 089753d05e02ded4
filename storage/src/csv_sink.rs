//! Batched CSV file sink

use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use loadgen_core::ResultSink;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Errors raised while setting up a sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output file could not be created
    #[error("failed to create {path}: {source}")]
    Create {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The flush interval was zero
    #[error("flush interval must be greater than zero")]
    InvalidFlushInterval,

    /// No tokio runtime to host the background flush task
    #[error("CSV sink must be created inside a tokio runtime")]
    NoRuntime,
}

/// A response type that can be written as one CSV row
pub trait CsvRecord {
    /// Column names, written once before the first row
    fn headers() -> &'static [&'static str];

    /// Field values for this row, in header order
    fn record(&self) -> Vec<String>;
}

struct WriterState {
    writer: Option<csv::Writer<File>>,
    header_written: bool,
    rows: u64,
}

/// Writes every collected response to a CSV file
///
/// The header row is written on the first `collect`. A background task
/// flushes buffered rows every `flush_interval`; `finalize` stops it,
/// flushes and closes the file. Responses collected after `finalize` are
/// dropped with a warning.
pub struct CsvSink<R> {
    path: PathBuf,
    state: Arc<Mutex<WriterState>>,
    flusher: CancellationToken,
    _record: PhantomData<fn(R)>,
}

impl<R: CsvRecord> CsvSink<R> {
    /// Create (or truncate) `path` and start the flush task
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created, `flush_interval` is zero or no
    /// tokio runtime is running.
    pub fn create(path: impl AsRef<Path>, flush_interval: Duration) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if flush_interval.is_zero() {
            return Err(SinkError::InvalidFlushInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SinkError::NoRuntime)?;

        let file = File::create(&path).map_err(|source| SinkError::Create {
            path: path.clone(),
            source,
        })?;

        let state = Arc::new(Mutex::new(WriterState {
            writer: Some(csv::Writer::from_writer(file)),
            header_written: false,
            rows: 0,
        }));
        let flusher = CancellationToken::new();
        runtime.spawn(run_flush(Arc::clone(&state), flusher.clone(), flush_interval));

        tracing::debug!(
            path = %path.display(),
            flush_interval_ms = flush_interval.as_millis() as u64,
            "CSV sink opened"
        );

        Ok(Self {
            path,
            state,
            flusher,
            _record: PhantomData,
        })
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far, excluding the header
    pub fn rows(&self) -> u64 {
        lock(&self.state).rows
    }
}

impl<R> ResultSink<R> for CsvSink<R>
where
    R: CsvRecord + Send + 'static,
{
    fn collect(&self, response: R) {
        let mut state = lock(&self.state);
        let WriterState {
            writer,
            header_written,
            rows,
        } = &mut *state;

        let Some(writer) = writer.as_mut() else {
            tracing::warn!(
                path = %self.path.display(),
                "Response collected after finalize, dropping"
            );
            return;
        };

        if !*header_written {
            if let Err(e) = writer.write_record(R::headers()) {
                tracing::warn!(error = %e, "Failed to write CSV header");
                return;
            }
            *header_written = true;
        }

        match writer.write_record(response.record()) {
            Ok(()) => *rows += 1,
            Err(e) => tracing::warn!(error = %e, "Failed to write CSV record"),
        }
    }

    fn finalize(&self) {
        self.flusher.cancel();

        let mut state = lock(&self.state);
        let Some(mut writer) = state.writer.take() else {
            return;
        };
        if let Err(e) = writer.flush() {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to flush CSV sink");
        }

        tracing::info!(path = %self.path.display(), rows = state.rows, "CSV sink closed");
    }
}

impl<R> Drop for CsvSink<R> {
    fn drop(&mut self) {
        self.flusher.cancel();
    }
}

async fn run_flush(state: Arc<Mutex<WriterState>>, stop: CancellationToken, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {
                if let Some(writer) = lock(&state).writer.as_mut() {
                    if let Err(e) = writer.flush() {
                        tracing::warn!(error = %e, "Periodic CSV flush failed");
                    }
                }
            }
        }
    }
}

fn lock(state: &Mutex<WriterState>) -> MutexGuard<'_, WriterState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

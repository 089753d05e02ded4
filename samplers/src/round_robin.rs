//! Round-robin supplier over a list of payloads

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use loadgen_core::DataSupplier;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while loading payloads
#[derive(Debug, Error)]
pub enum SamplerError {
    /// The payload list is empty
    #[error("no payloads to supply")]
    Empty,

    /// The payload file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A line did not parse as a payload
    #[error("{path}:{line}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// JSON error
        source: serde_json::Error,
    },
}

/// Cycles through a fixed list of requests
///
/// Concurrent callers share one atomic cursor, so every payload is handed
/// out equally often.
#[derive(Debug)]
pub struct RoundRobinSupplier<T> {
    requests: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> RoundRobinSupplier<T> {
    /// Create a supplier over `requests`
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Empty`] if `requests` is empty.
    pub fn new(requests: Vec<T>) -> Result<Self, SamplerError> {
        if requests.is_empty() {
            return Err(SamplerError::Empty);
        }
        Ok(Self {
            requests,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of distinct payloads
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Always false; an empty supplier cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl<T: DeserializeOwned> RoundRobinSupplier<T> {
    /// Load one payload per non-blank line of a JSON-lines file
    pub fn from_json_lines(path: impl AsRef<Path>) -> Result<Self, SamplerError> {
        let path = path.as_ref();
        let io_err = |source| SamplerError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut requests = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(io_err)?;
            if line.trim().is_empty() {
                continue;
            }
            let request = serde_json::from_str(&line).map_err(|source| SamplerError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })?;
            requests.push(request);
        }

        tracing::debug!(path = %path.display(), payloads = requests.len(), "Loaded payloads");
        Self::new(requests)
    }
}

impl<T> DataSupplier<T> for RoundRobinSupplier<T>
where
    T: Clone + Send + Sync,
{
    fn next(&self) -> T {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.requests.len();
        self.requests[idx].clone()
    }
}

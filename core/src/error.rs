//! Error types for loadgen-core

use thiserror::Error;

use crate::config::ConfigError;

/// Core error type
///
/// Only configuration and wiring problems are errors. Deadlines, stop
/// signals and per-request outcomes are normal termination paths and
/// never show up here.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Invalid workload configuration, raised before any execution starts
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A required capability was not supplied to a builder
    #[error("missing required component: {0}")]
    MissingComponent(&'static str),

    /// `Orchestrator::run` was invoked a second time
    #[error("orchestrator has already run")]
    AlreadyRun,

    /// Orchestration failure (e.g. every phase task panicked)
    #[error("orchestration error: {0}")]
    Orchestration(String),
}

impl LoadError {
    /// Create a missing component error
    pub fn missing(component: &'static str) -> Self {
        Self::MissingComponent(component)
    }

    /// Create an orchestration error
    pub fn orchestration(msg: impl Into<String>) -> Self {
        Self::Orchestration(msg.into())
    }

    /// Whether this error stems from the workload configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias
pub type LoadResult<T> = std::result::Result<T, LoadError>;

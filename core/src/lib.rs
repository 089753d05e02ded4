//! loadgen-core: Rate-controlled dispatch and phase orchestration
//!
//! This crate provides the engine every other loadgen component plugs into:
//!
//! - Phase schedule model and configuration validation
//! - Deterministic schedule generation from weighted pattern templates
//! - Rate-to-tick conversion
//! - Constant and ramping phase executors with tracked, optionally bounded dispatch
//! - The orchestrator running overlapping phases under one global deadline
//! - Capability traits (invoker, data supplier, result sink)
//! - Error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod orchestrator;
pub mod phase;
pub mod scheduler;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, DispatchConfig, WorkloadConfig};
pub use error::{LoadError, LoadResult};
pub use executor::{
    executor_for, Capabilities, ConstantExecutor, DrainReport, LoadExecutor, PhaseEnd, PhaseStats,
    RampingExecutor,
};
pub use generator::WorkloadPatternGenerator;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, PhaseOutcome, PhaseReport, RunReport};
pub use phase::{IntRange, PatternTemplate, Phase, PhaseKind, PhaseParameters, MAX_PHASE_COUNT};
pub use scheduler::{calculate_interval, TickPlan, MIN_INTERVAL};
pub use traits::{DataSupplier, Invoker, ResultSink};

//! Orchestrator for run lifecycle management
//!
//! The Orchestrator coordinates one complete load run:
//! - Resolving the phase schedule (explicit or generated from patterns)
//! - Launching every phase concurrently at its start offset
//! - Bounding the whole run by one global deadline
//! - Joining every phase and its dispatches before finalizing the sink
//!
//! Overlapping phases run side by side with independent rate control, so
//! their rates add up.
//!
//! # Example
//!
//! ```ignore
//! use loadgen_core::{OrchestratorBuilder, WorkloadConfig};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .config(WorkloadConfig::from_phases(max_duration, phases))
//!     .invoker(invoker)
//!     .supplier(supplier)
//!     .sink(sink)
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod executor;
mod report;

pub use builder::OrchestratorBuilder;
pub use executor::Orchestrator;
pub use report::{PhaseOutcome, PhaseReport, RunReport};

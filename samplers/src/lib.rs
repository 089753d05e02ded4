//! Request data suppliers for loadgen runs
//!
//! This crate provides implementations of the
//! [`DataSupplier`](loadgen_core::DataSupplier) trait for:
//!
//! - A single fixed payload ([`FixedSupplier`])
//! - Cycling through a list of payloads ([`RoundRobinSupplier`]), optionally
//!   loaded from a JSON-lines file

#![warn(missing_docs)]
#![warn(clippy::all)]

mod fixed;
mod round_robin;

pub use fixed::FixedSupplier;
pub use round_robin::{RoundRobinSupplier, SamplerError};

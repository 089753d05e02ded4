//! Invoker implementations for loadgen targets
//!
//! This crate provides implementations of the
//! [`Invoker`](loadgen_core::Invoker) trait for:
//!
//! - JSON over HTTP ([`HttpInvoker`])

#![warn(missing_docs)]
#![warn(clippy::all)]

mod http;

pub use http::{HttpInvoker, HttpOutcome, TargetConfig, VendorError};

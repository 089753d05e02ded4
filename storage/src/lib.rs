//! Result sinks for loadgen runs
//!
//! This crate provides [`ResultSink`](loadgen_core::ResultSink)
//! implementations that persist responses:
//!
//! - [`CsvSink`]: one CSV row per response, flushed periodically

#![warn(missing_docs)]
#![warn(clippy::all)]

mod csv_sink;

pub use csv_sink::{CsvRecord, CsvSink, SinkError};

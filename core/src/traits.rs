//! Capability traits consumed by the engine
//!
//! The engine never performs a call, builds a payload or stores a result
//! itself. Callers wire one [`Invoker`], one [`DataSupplier`] and one
//! [`ResultSink`] sharing the same request and response types; concrete
//! implementations live in their own crates (vendors/, samplers/, storage/).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Invoker
// ============================================================================

/// Performs one call against the system under test
///
/// Failures are part of the response value; the engine does not interpret,
/// retry or count them.
#[async_trait]
pub trait Invoker<Req, Resp>: Send + Sync {
    /// Send `request` and return the outcome
    ///
    /// `cancel` fires when the surrounding run reaches its deadline or is
    /// shut down. Implementations may use it to abandon a call early.
    async fn call(&self, request: Req, cancel: CancellationToken) -> Resp;
}

// ============================================================================
// Data Supplier
// ============================================================================

/// Produces request payloads
///
/// Called concurrently from any number of dispatch tasks.
pub trait DataSupplier<Req>: Send + Sync {
    /// Produce the next request
    fn next(&self) -> Req;
}

// ============================================================================
// Result Sink
// ============================================================================

/// Receives every response produced during a run
pub trait ResultSink<Resp>: Send + Sync {
    /// Record one response. Called concurrently, arbitrarily many times.
    fn collect(&self, response: Resp);

    /// Flush and release resources. Called once per run, after every
    /// dispatch task of every phase has been joined.
    fn finalize(&self);
}

//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::{DispatchConfig, WorkloadConfig};
use crate::error::{LoadError, LoadResult};
use crate::executor::Capabilities;
use crate::traits::{DataSupplier, Invoker, ResultSink};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// All validation happens in [`build`](Self::build): a builder that returns
/// `Ok` hands back an orchestrator whose schedule is already resolved.
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .config(workload)
///     .invoker(invoker)
///     .supplier(supplier)
///     .sink(sink)
///     .dispatch(DispatchConfig::default().with_max_in_flight(1000))
///     .build()?;
/// ```
pub struct OrchestratorBuilder<Req, Resp> {
    config: Option<WorkloadConfig>,
    invoker: Option<Arc<dyn Invoker<Req, Resp>>>,
    supplier: Option<Arc<dyn DataSupplier<Req>>>,
    sink: Option<Arc<dyn ResultSink<Resp>>>,
    dispatch: DispatchConfig,
}

impl<Req, Resp> OrchestratorBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            config: None,
            invoker: None,
            supplier: None,
            sink: None,
            dispatch: DispatchConfig::default(),
        }
    }

    /// Set the workload configuration
    pub fn config(mut self, config: WorkloadConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the invoker
    pub fn invoker(mut self, invoker: Arc<dyn Invoker<Req, Resp>>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Set the data supplier
    pub fn supplier(mut self, supplier: Arc<dyn DataSupplier<Req>>) -> Self {
        self.supplier = Some(supplier);
        self
    }

    /// Set the result sink
    pub fn sink(mut self, sink: Arc<dyn ResultSink<Resp>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set invoker, supplier and sink at once
    pub fn capabilities(self, capabilities: Capabilities<Req, Resp>) -> Self {
        self.invoker(capabilities.invoker)
            .supplier(capabilities.supplier)
            .sink(capabilities.sink)
    }

    /// Set dispatch tuning
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if a component is missing or the configuration is
    /// invalid. Pattern-based schedules are generated here, so bad weights
    /// are reported before anything runs.
    pub fn build(self) -> LoadResult<Orchestrator<Req, Resp>> {
        let config = self.config.ok_or_else(|| LoadError::missing("workload config"))?;
        let invoker = self.invoker.ok_or_else(|| LoadError::missing("invoker"))?;
        let supplier = self.supplier.ok_or_else(|| LoadError::missing("supplier"))?;
        let sink = self.sink.ok_or_else(|| LoadError::missing("sink"))?;

        self.dispatch.validate()?;
        let phases = config.resolve_phases()?;

        tracing::debug!(
            phases = phases.len(),
            generated = config.generate_from_patterns,
            max_in_flight = ?self.dispatch.max_in_flight,
            "Orchestrator configured"
        );

        Ok(Orchestrator::new(
            config,
            phases,
            Capabilities::new(invoker, supplier, sink),
            self.dispatch,
        ))
    }
}

impl<Req, Resp> Default for OrchestratorBuilder<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

//! Orchestrator execution logic

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{DispatchConfig, WorkloadConfig};
use crate::error::{LoadError, LoadResult};
use crate::executor::{executor_for, Capabilities};
use crate::phase::Phase;

use super::report::{PhaseReport, RunReport};

/// Orchestrator manages the run lifecycle
///
/// Launches one task per phase, each delayed by the phase's start offset
/// and bounded by the global deadline, joins them all, then finalizes the
/// result sink exactly once.
pub struct Orchestrator<Req, Resp> {
    /// Workload configuration
    pub(crate) config: WorkloadConfig,

    /// Resolved phase schedule
    pub(crate) phases: Vec<Phase>,

    /// Invoker, supplier and sink shared by all phases
    pub(crate) capabilities: Capabilities<Req, Resp>,

    /// Dispatch tuning
    pub(crate) dispatch: DispatchConfig,

    /// External shutdown signal; the run's deadline token is its child
    pub(crate) shutdown: CancellationToken,

    /// Set by the first call to `run`
    pub(crate) started: AtomicBool,
}

impl<Req, Resp> Orchestrator<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a new orchestrator from an already resolved schedule
    ///
    /// Use `OrchestratorBuilder` for a validated construction.
    pub fn new(
        config: WorkloadConfig,
        phases: Vec<Phase>,
        capabilities: Capabilities<Req, Resp>,
        dispatch: DispatchConfig,
    ) -> Self {
        Self {
            config,
            phases,
            capabilities,
            dispatch,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Trigger shutdown of all phases. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Get the workload configuration
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Get the resolved phase schedule
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Run the workload
    ///
    /// Returns once every phase has ended and drained and the sink has been
    /// finalized. Deadlines and shutdown are normal ways for a run to end and
    /// are reported in the [`RunReport`], not as errors.
    ///
    /// # Errors
    ///
    /// [`LoadError::AlreadyRun`] on a second call, and
    /// [`LoadError::Orchestration`] if every phase task panicked.
    pub async fn run(&self) -> LoadResult<RunReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LoadError::AlreadyRun);
        }

        let origin = Instant::now();
        let deadline = self.shutdown.child_token();
        let timer = tokio::spawn(global_deadline(deadline.clone(), self.config.max_duration));

        tracing::info!(
            phases = self.phases.len(),
            max_duration_ms = self.config.max_duration.as_millis() as u64,
            generated = self.config.generate_from_patterns,
            seed = self.config.seed,
            "Starting run"
        );

        let mut handles = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            handles.push(tokio::spawn(run_phase(
                phase.clone(),
                self.capabilities.clone(),
                self.dispatch.clone(),
                deadline.clone(),
                origin,
            )));
        }

        let mut reports = Vec::with_capacity(handles.len());
        let mut failures = 0;
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    failures += 1;
                    tracing::error!(
                        phase = %self.phases[idx].name,
                        error = %e,
                        "Phase task panicked"
                    );
                }
            }
        }

        // ends the timer if it has not fired
        deadline.cancel();
        let deadline_reached = timer.await.unwrap_or(false);

        self.capabilities.sink.finalize();

        if reports.is_empty() && failures > 0 {
            return Err(LoadError::orchestration(format!(
                "All {} phase tasks failed to complete",
                failures
            )));
        }

        let report = RunReport {
            phases: reports,
            elapsed: origin.elapsed(),
            deadline_reached,
            cancelled: self.shutdown.is_cancelled(),
            failed_phases: failures,
        };

        tracing::info!(
            elapsed_secs = report.elapsed.as_secs_f64(),
            dispatched = report.total_dispatched(),
            completed = report.total_completed(),
            shed = report.total_shed(),
            abandoned = report.total_abandoned(),
            skipped = report.skipped(),
            deadline_reached,
            cancelled = report.cancelled,
            "Run completed"
        );

        Ok(report)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Automatically triggers graceful shutdown on Ctrl+C.
    pub async fn run_with_signal_handling(&self) -> LoadResult<RunReport> {
        let shutdown = self.shutdown.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                    shutdown.cancel();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;
        signal_handle.abort();

        result
    }
}

/// Cancel `deadline` after `max_duration`; returns whether it fired
async fn global_deadline(deadline: CancellationToken, max_duration: Duration) -> bool {
    tokio::select! {
        _ = deadline.cancelled() => false,
        _ = tokio::time::sleep(max_duration) => {
            tracing::info!(
                max_duration_ms = max_duration.as_millis() as u64,
                "Global deadline reached"
            );
            deadline.cancel();
            true
        }
    }
}

/// One phase unit: wait for the start offset, execute, drain
async fn run_phase<Req, Resp>(
    phase: Phase,
    capabilities: Capabilities<Req, Resp>,
    dispatch: DispatchConfig,
    deadline: CancellationToken,
    origin: Instant,
) -> PhaseReport
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    let start_at = origin.checked_add(phase.start_offset);
    let wait = async {
        match start_at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;

        _ = deadline.cancelled() => {
            tracing::info!(
                phase = %phase.name,
                start_offset_ms = phase.start_offset.as_millis() as u64,
                "Run ended before phase start, skipping"
            );
            return PhaseReport::skipped(&phase);
        }
        _ = wait => {}
    }

    let executor = executor_for(phase.kind, capabilities, &dispatch);
    let stats = executor.execute(&deadline, &phase).await;
    let drain = executor.drain(dispatch.drain_timeout).await;

    tracing::debug!(
        phase = %phase.name,
        completed = drain.completed,
        abandoned = drain.abandoned,
        waited_ms = drain.waited.as_millis() as u64,
        "Phase drained"
    );

    PhaseReport::ran(&phase, stats, drain)
}

impl<Req, Resp> std::fmt::Debug for Orchestrator<Req, Resp> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("phases", &self.phases.len())
            .field("dispatch", &self.dispatch)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

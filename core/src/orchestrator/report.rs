//! Run results aggregated from all phases

use std::time::Duration;

use crate::executor::{DrainReport, PhaseEnd, PhaseStats};
use crate::phase::{Phase, PhaseKind};

/// What happened to one scheduled phase
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    /// The run ended before the phase's start offset
    Skipped,
    /// The phase executed and its dispatches were drained
    Ran {
        /// Executor statistics
        stats: PhaseStats,
        /// Result of joining the phase's dispatch tasks
        drain: DrainReport,
    },
}

/// Report for one phase of a run
#[derive(Debug, Clone)]
pub struct PhaseReport {
    /// Phase name
    pub name: String,

    /// Rate profile
    pub kind: PhaseKind,

    /// Configured start offset
    pub start_offset: Duration,

    /// Execution outcome
    pub outcome: PhaseOutcome,
}

impl PhaseReport {
    pub(crate) fn skipped(phase: &Phase) -> Self {
        Self {
            name: phase.name.clone(),
            kind: phase.kind,
            start_offset: phase.start_offset,
            outcome: PhaseOutcome::Skipped,
        }
    }

    pub(crate) fn ran(phase: &Phase, stats: PhaseStats, drain: DrainReport) -> Self {
        Self {
            name: phase.name.clone(),
            kind: phase.kind,
            start_offset: phase.start_offset,
            outcome: PhaseOutcome::Ran { stats, drain },
        }
    }

    /// Executor statistics, if the phase ran
    pub fn stats(&self) -> Option<&PhaseStats> {
        match &self.outcome {
            PhaseOutcome::Ran { stats, .. } => Some(stats),
            PhaseOutcome::Skipped => None,
        }
    }

    /// Drain result, if the phase ran
    pub fn drain(&self) -> Option<&DrainReport> {
        match &self.outcome {
            PhaseOutcome::Ran { drain, .. } => Some(drain),
            PhaseOutcome::Skipped => None,
        }
    }

    /// Whether the phase never started
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Skipped)
    }

    /// Why the phase ended; `None` if it was skipped
    pub fn end(&self) -> Option<PhaseEnd> {
        self.stats().map(|s| s.end)
    }
}

/// Aggregated result of one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One report per scheduled phase, in schedule order
    pub phases: Vec<PhaseReport>,

    /// Wall-clock time from start until the sink was finalized
    pub elapsed: Duration,

    /// The global deadline fired before every phase finished
    pub deadline_reached: bool,

    /// The run was shut down from outside
    pub cancelled: bool,

    /// Phase tasks that panicked and produced no report
    pub failed_phases: usize,
}

impl RunReport {
    /// Total dispatch tasks launched
    pub fn total_dispatched(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.stats()).map(|s| s.dispatched).sum()
    }

    /// Total dispatches that delivered a response to the sink
    pub fn total_completed(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.drain()).map(|d| d.completed).sum()
    }

    /// Total dispatches dropped by the in-flight limit
    pub fn total_shed(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.stats()).map(|s| s.shed).sum()
    }

    /// Total dispatches still running when their phase gave up draining
    pub fn total_abandoned(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.drain()).map(|d| d.abandoned).sum()
    }

    /// Number of phases that never started
    pub fn skipped(&self) -> usize {
        self.phases.iter().filter(|p| p.is_skipped()).count()
    }

    /// Overall dispatch rate across the run
    pub fn dispatch_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_dispatched() as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ran(name: &str, dispatched: u64, shed: u64, completed: u64, abandoned: u64) -> PhaseReport {
        let phase = Phase::constant(name, Duration::ZERO, Duration::from_secs(1), 1);
        let mut stats = PhaseStats::new(name, PhaseKind::Constant);
        stats.dispatched = dispatched;
        stats.shed = shed;
        stats.end = PhaseEnd::Completed;
        let drain = DrainReport {
            completed,
            abandoned,
            waited: Duration::ZERO,
        };
        PhaseReport::ran(&phase, stats, drain)
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::default();
        assert_eq!(report.total_dispatched(), 0);
        assert_eq!(report.skipped(), 0);
        assert_eq!(report.dispatch_rate(), 0.0);
    }

    #[test]
    fn test_totals_ignore_skipped_phases() {
        let skipped = PhaseReport::skipped(&Phase::constant(
            "late",
            Duration::from_secs(60),
            Duration::from_secs(1),
            5,
        ));
        let report = RunReport {
            phases: vec![ran("a", 10, 2, 9, 1), skipped, ran("b", 5, 0, 5, 0)],
            elapsed: Duration::from_secs(5),
            ..Default::default()
        };

        assert_eq!(report.total_dispatched(), 15);
        assert_eq!(report.total_shed(), 2);
        assert_eq!(report.total_completed(), 14);
        assert_eq!(report.total_abandoned(), 1);
        assert_eq!(report.skipped(), 1);
        assert!((report.dispatch_rate() - 3.0).abs() < 1e-9);
        assert_eq!(report.phases[1].end(), None);
        assert_eq!(report.phases[0].end(), Some(PhaseEnd::Completed));
    }
}

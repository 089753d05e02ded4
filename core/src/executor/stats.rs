//! Per-phase statistics tracking

use std::fmt;
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

use crate::phase::PhaseKind;

/// Why a phase stopped dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseEnd {
    /// Still running
    #[default]
    Running,
    /// The phase duration elapsed
    Completed,
    /// The enclosing run was cancelled (global deadline or shutdown)
    Cancelled,
    /// `stop()` was called on the executor
    Stopped,
    /// A ramp stepped to zero or below
    RateExhausted,
}

impl fmt::Display for PhaseEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PhaseEnd::Running => "running",
            PhaseEnd::Completed => "completed",
            PhaseEnd::Cancelled => "cancelled",
            PhaseEnd::Stopped => "stopped",
            PhaseEnd::RateExhausted => "rate exhausted",
        };
        f.write_str(label)
    }
}

/// Statistics tracked by each executor for one phase
#[derive(Debug, Clone)]
pub struct PhaseStats {
    /// Phase name
    pub name: String,

    /// Rate profile
    pub kind: PhaseKind,

    /// Number of scheduler ticks that fired
    pub ticks: u64,

    /// Dispatch tasks launched
    pub dispatched: u64,

    /// Dispatches dropped by the in-flight limit
    pub shed: u64,

    /// Highest target rate the phase reached
    pub peak_rps: u64,

    /// Why the phase ended
    pub end: PhaseEnd,

    /// Phase start time
    pub started_at: Option<Instant>,

    /// Phase end time
    pub ended_at: Option<Instant>,
}

impl PhaseStats {
    /// Create empty stats for a phase
    pub fn new(name: impl Into<String>, kind: PhaseKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ticks: 0,
            dispatched: 0,
            shed: 0,
            peak_rps: 0,
            end: PhaseEnd::Running,
            started_at: None,
            ended_at: None,
        }
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking with the given reason
    pub fn finish(&mut self, end: PhaseEnd) {
        self.end = end;
        self.ended_at = Some(Instant::now());
    }

    /// Record one tick and what it launched
    pub fn record_tick(&mut self, launched: u64, shed: u64) {
        self.ticks += 1;
        self.dispatched += launched;
        self.shed += shed;
    }

    /// Track the highest rate seen
    pub fn observe_rate(&mut self, rps: NonZeroU64) {
        self.peak_rps = self.peak_rps.max(rps.get());
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Achieved dispatch rate
    pub fn dispatch_rate(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.dispatched as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }
}

//! Phase schedule data model
//!
//! A [`Phase`] is one time-boxed traffic segment with a single rate profile.
//! A [`PatternTemplate`] is the seeded recipe the
//! [`WorkloadPatternGenerator`](crate::generator::WorkloadPatternGenerator)
//! expands into phases.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;

/// Largest number of phases a single pattern template may expand into
pub const MAX_PHASE_COUNT: i64 = 10_000;

/// Rate profile of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Fixed RPS for the whole phase
    Constant,
    /// RPS moves by `step` once per second until `end_rps` is reached
    #[serde(alias = "variable")]
    Ramping,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Constant => f.write_str("constant"),
            PhaseKind::Ramping => f.write_str("ramping"),
        }
    }
}

/// One time-boxed segment of a workload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase name, used in logs and reports
    pub name: String,

    /// Constant or ramping
    #[serde(rename = "type")]
    pub kind: PhaseKind,

    /// Delay after orchestrator start before this phase begins
    #[serde(default, with = "humantime_serde")]
    pub start_offset: Duration,

    /// How long the phase runs
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Initial (or constant) requests per second
    pub start_rps: u64,

    /// Target RPS of a ramp
    #[serde(default)]
    pub end_rps: u64,

    /// Signed per-second RPS change of a ramp
    #[serde(default)]
    pub step: i64,
}

impl Phase {
    /// Create a constant-rate phase
    pub fn constant(
        name: impl Into<String>,
        start_offset: Duration,
        duration: Duration,
        rps: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PhaseKind::Constant,
            start_offset,
            duration,
            start_rps: rps,
            end_rps: rps,
            step: 0,
        }
    }

    /// Create a ramping phase
    pub fn ramping(
        name: impl Into<String>,
        start_offset: Duration,
        duration: Duration,
        start_rps: u64,
        end_rps: u64,
        step: i64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PhaseKind::Ramping,
            start_offset,
            duration,
            start_rps,
            end_rps,
            step,
        }
    }

    /// Offset at which this phase ends, relative to orchestrator start
    pub fn end_offset(&self) -> Duration {
        self.start_offset.saturating_add(self.duration)
    }

    /// Validate an explicitly configured phase
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::InvalidPhase {
                phase: self.name.clone(),
                reason: "duration must be greater than zero".into(),
            });
        }
        if self.kind == PhaseKind::Ramping && self.step == 0 {
            return Err(ConfigError::InvalidPhase {
                phase: self.name.clone(),
                reason: "ramping phase requires a non-zero step".into(),
            });
        }
        Ok(())
    }
}

/// Inclusive integer range
///
/// `min > max` is tolerated and treated as the swapped range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntRange {
    /// Lower bound (inclusive)
    pub min: i64,
    /// Upper bound (inclusive)
    pub max: i64,
}

impl IntRange {
    /// Create a new range
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Range containing a single value
    pub fn fixed(value: i64) -> Self {
        Self::new(value, value)
    }

    /// Bounds with `min <= max`
    pub fn bounds(&self) -> (i64, i64) {
        (self.min.min(self.max), self.min.max(self.max))
    }

    /// Draw a uniform value from the corrected range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let (lo, hi) = self.bounds();
        rng.gen_range(lo..=hi)
    }
}

/// RPS knobs of a pattern template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhaseParameters {
    /// Range for `Phase::start_rps`
    pub start_rps: IntRange,
    /// Range for `Phase::end_rps`
    pub end_rps: IntRange,
    /// Range for `Phase::step`
    pub step: IntRange,
}

/// A weighted recipe for synthesizing phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTemplate {
    /// Template name; generated phases are named `{name}_{index}`
    pub name: String,

    /// How many phases this template expands into
    pub phase_count: IntRange,

    /// Probability (0.0-1.0) that a generated phase is constant
    #[serde(default)]
    pub constant_likelihood: f64,

    /// Descriptive only; the ramping share is `1 - constant_likelihood`
    #[serde(default)]
    pub ramping_likelihood: f64,

    /// Fraction of total workload time for this template. All zero means an
    /// even split, otherwise the weights must sum to 1.0.
    #[serde(default)]
    pub weight: f64,

    /// Ranges the generated phases draw from
    #[serde(default)]
    pub parameters: PhaseParameters,
}

impl PatternTemplate {
    /// Create a template with the given phase count range and everything
    /// else zeroed
    pub fn new(name: impl Into<String>, phase_count: IntRange) -> Self {
        Self {
            name: name.into(),
            phase_count,
            constant_likelihood: 0.0,
            ramping_likelihood: 0.0,
            weight: 0.0,
            parameters: PhaseParameters::default(),
        }
    }

    /// Set the constant likelihood (ramping likelihood becomes its complement)
    pub fn with_constant_likelihood(mut self, likelihood: f64) -> Self {
        self.constant_likelihood = likelihood;
        self.ramping_likelihood = 1.0 - likelihood;
        self
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the parameter ranges
    pub fn with_parameters(
        mut self,
        start_rps: IntRange,
        end_rps: IntRange,
        step: IntRange,
    ) -> Self {
        self.parameters = PhaseParameters {
            start_rps,
            end_rps,
            step,
        };
        self
    }

    /// Validate the template on its own (weight totals are checked by the
    /// generator)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: self.name.clone(),
            reason: reason.to_string(),
        };

        let (min_count, max_count) = self.phase_count.bounds();
        if min_count < 1 {
            return Err(invalid("phase count range must be at least 1"));
        }
        if max_count > MAX_PHASE_COUNT {
            return Err(invalid(&format!("phase count range must not exceed {MAX_PHASE_COUNT}")));
        }
        if !(0.0..=1.0).contains(&self.constant_likelihood) {
            return Err(invalid("constant likelihood must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.ramping_likelihood) {
            return Err(invalid("ramping likelihood must be within [0, 1]"));
        }
        if self.weight < 0.0 || !self.weight.is_finite() {
            return Err(invalid("weight must be a non-negative number"));
        }
        if self.parameters.start_rps.bounds().0 < 0 || self.parameters.end_rps.bounds().0 < 0 {
            return Err(invalid("rps ranges must not be negative"));
        }
        Ok(())
    }
}

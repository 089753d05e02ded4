//! Workload configuration types

use crate::generator::WorkloadPatternGenerator;
use crate::phase::{PatternTemplate, Phase};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workload configuration
///
/// Describes a schedule either as explicit phases or as pattern templates
/// that are expanded with a seeded generator. Exactly one of the two lists
/// must be populated, matching `generate_from_patterns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Synthesize phases from `patterns` instead of using `phases`
    #[serde(default, alias = "generate_workload")]
    pub generate_from_patterns: bool,

    /// Seed for deterministic phase generation
    #[serde(default)]
    pub seed: i64,

    /// Global deadline for the whole run
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,

    /// Pattern templates, processed in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<PatternTemplate>,

    /// Explicit phases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<Phase>,
}

impl WorkloadConfig {
    /// Create a config that runs explicit phases
    pub fn from_phases(max_duration: Duration, phases: Vec<Phase>) -> Self {
        Self {
            generate_from_patterns: false,
            seed: 0,
            max_duration,
            patterns: Vec::new(),
            phases,
        }
    }

    /// Create a config that generates its phases from pattern templates
    pub fn from_patterns(
        seed: i64,
        max_duration: Duration,
        patterns: Vec<PatternTemplate>,
    ) -> Self {
        Self {
            generate_from_patterns: true,
            seed,
            max_duration,
            patterns,
            phases: Vec::new(),
        }
    }

    /// Validate the configuration
    ///
    /// Checks the schedule shape and every explicit phase. Pattern weights
    /// are checked when the schedule is generated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_duration.is_zero() {
            return Err(ConfigError::InvalidMaxDuration);
        }

        if self.generate_from_patterns {
            if self.patterns.is_empty() {
                return Err(ConfigError::MissingPatterns);
            }
            if !self.phases.is_empty() {
                return Err(ConfigError::AmbiguousSchedule);
            }
            for pattern in &self.patterns {
                pattern.validate()?;
            }
        } else {
            if self.phases.is_empty() {
                return Err(ConfigError::MissingPhases);
            }
            if !self.patterns.is_empty() {
                return Err(ConfigError::AmbiguousSchedule);
            }
            for phase in &self.phases {
                phase.validate()?;
            }
        }

        Ok(())
    }

    /// Validate and return the phase schedule this config describes
    pub fn resolve_phases(&self) -> Result<Vec<Phase>, ConfigError> {
        self.validate()?;

        if self.generate_from_patterns {
            WorkloadPatternGenerator::new(self.seed, self.max_duration, &self.patterns).generate()
        } else {
            Ok(self.phases.clone())
        }
    }
}

/// Dispatch tuning shared by every phase of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on concurrently running dispatch tasks per phase.
    /// `None` leaves dispatch unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,

    /// How long a finished phase waits for its outstanding dispatches
    #[serde(default = "default_drain_timeout", with = "humantime_serde")]
    pub drain_timeout: Duration,
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            drain_timeout: default_drain_timeout(),
        }
    }
}

impl DispatchConfig {
    /// Bound the number of in-flight dispatch tasks per phase
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Set the drain timeout
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::InvalidDispatch(
                "max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Generation requested without templates
    #[error("workload generation is enabled but no patterns provided")]
    MissingPatterns,

    /// Explicit schedule requested without phases
    #[error("workload generation is disabled but no phases provided")]
    MissingPhases,

    /// Both lists populated
    #[error("exactly one of phases or patterns must be provided")]
    AmbiguousSchedule,

    /// Non-zero weights that do not add up to one
    #[error("pattern weights must sum to 1.0")]
    InvalidWeights,

    /// Zero global deadline
    #[error("max duration must be greater than zero")]
    InvalidMaxDuration,

    /// A single phase is malformed
    #[error("invalid phase '{phase}': {reason}")]
    InvalidPhase {
        /// Phase name
        phase: String,
        /// What is wrong with it
        reason: String,
    },

    /// A single template is malformed
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Template name
        pattern: String,
        /// What is wrong with it
        reason: String,
    },

    /// Dispatch tuning is malformed
    #[error("invalid dispatch config: {0}")]
    InvalidDispatch(String),
}

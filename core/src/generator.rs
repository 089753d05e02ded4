//! Deterministic phase synthesis from weighted pattern templates
//!
//! Templates are laid out back-to-back in list order. Each template gets a
//! share of `max_duration` (by weight, or an even split when every weight is
//! zero) and expands into a seeded-random number of equally long phases.
//! Identical `(seed, max_duration, templates)` always produce the identical
//! schedule.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

use crate::config::ConfigError;
use crate::phase::{PatternTemplate, Phase, PhaseKind};

/// Weight totals within this distance of 1.0 are accepted
const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Expands pattern templates into a phase schedule
pub struct WorkloadPatternGenerator<'a> {
    seed: i64,
    max_duration: Duration,
    templates: &'a [PatternTemplate],
}

impl<'a> WorkloadPatternGenerator<'a> {
    /// Create a generator over the given templates
    pub fn new(seed: i64, max_duration: Duration, templates: &'a [PatternTemplate]) -> Self {
        Self {
            seed,
            max_duration,
            templates,
        }
    }

    /// Time allotted to each template, in template order
    pub fn allocations(&self) -> Result<Vec<Duration>, ConfigError> {
        if self.templates.is_empty() {
            return Ok(Vec::new());
        }

        let total: f64 = self.templates.iter().map(|t| t.weight).sum();
        if total == 0.0 {
            let share = self.max_duration / self.templates.len() as u32;
            return Ok(vec![share; self.templates.len()]);
        }
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::InvalidWeights);
        }

        let nanos = self.max_duration.as_nanos() as f64;
        Ok(self
            .templates
            .iter()
            .map(|t| Duration::from_nanos((nanos * t.weight).round() as u64))
            .collect())
    }

    /// Generate the phase schedule
    ///
    /// Fails before producing any phase if the weights are invalid or a
    /// template is malformed.
    pub fn generate(&self) -> Result<Vec<Phase>, ConfigError> {
        for template in self.templates {
            template.validate()?;
        }
        let allocations = self.allocations()?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed as u64);
        let mut cursor = Duration::ZERO;
        let mut phases = Vec::new();

        for (template, allocated) in self.templates.iter().zip(allocations) {
            let count = u32::try_from(template.phase_count.sample(&mut rng))
                .ok()
                .filter(|&count| count > 0)
                .ok_or_else(|| ConfigError::InvalidPattern {
                    pattern: template.name.clone(),
                    reason: "phase count out of range".into(),
                })?;
            let phase_duration = allocated / count;

            tracing::debug!(
                pattern = %template.name,
                phases = count,
                allocated_ms = allocated.as_millis() as u64,
                "Expanding pattern"
            );

            for index in 0..count {
                let kind = if rng.gen::<f64>() < template.constant_likelihood {
                    PhaseKind::Constant
                } else {
                    PhaseKind::Ramping
                };
                let params = &template.parameters;
                let start_rps = params.start_rps.sample(&mut rng).max(0) as u64;
                let end_rps = params.end_rps.sample(&mut rng).max(0) as u64;
                let step = params.step.sample(&mut rng);

                phases.push(Phase {
                    name: format!("{}_{}", template.name, index),
                    kind,
                    start_offset: cursor,
                    duration: phase_duration,
                    start_rps,
                    end_rps,
                    step,
                });
                cursor += phase_duration;
            }
        }

        Ok(phases)
    }
}

//! Run configuration file

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use loadgen_core::{DataSupplier, DispatchConfig, Phase, WorkloadConfig};
use loadgen_samplers::{FixedSupplier, RoundRobinSupplier};
use loadgen_vendors::TargetConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level YAML configuration for `run`, `validate` and `plan`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Phase schedule
    pub workload: WorkloadConfig,

    /// Endpoint every request is sent to
    pub target: TargetConfig,

    /// Request bodies
    #[serde(default)]
    pub payload: PayloadConfig,

    /// Result file
    #[serde(default)]
    pub output: OutputConfig,

    /// Dispatch tuning
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Where request bodies come from
///
/// With neither field set requests carry no body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// One JSON body used for every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// JSON-lines file cycled through in order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl PayloadConfig {
    /// Build the matching supplier
    pub fn supplier(&self) -> Result<Arc<dyn DataSupplier<Value>>> {
        match (&self.body, &self.file) {
            (Some(_), Some(_)) => bail!("payload: set either `body` or `file`, not both"),
            (None, Some(file)) => {
                let supplier = RoundRobinSupplier::<Value>::from_json_lines(file)
                    .with_context(|| format!("failed to load payloads from {}", file.display()))?;
                Ok(Arc::new(supplier))
            }
            (body, None) => Ok(Arc::new(FixedSupplier::new(body.clone().unwrap_or(Value::Null)))),
        }
    }
}

/// CSV output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Result file path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// How often buffered rows are flushed
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("results.csv")
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            flush_interval: default_flush_interval(),
        }
    }
}

impl FileConfig {
    /// Read and parse a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Check everything that can be checked without side effects and
    /// return the resolved schedule
    pub fn validate(&self) -> Result<Vec<Phase>> {
        let phases = self.workload.resolve_phases()?;
        self.dispatch.validate()?;
        self.target.validate()?;
        if self.payload.body.is_some() && self.payload.file.is_some() {
            bail!("payload: set either `body` or `file`, not both");
        }
        if self.output.flush_interval.is_zero() {
            bail!("output.flush_interval must be greater than zero");
        }
        Ok(phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPLICIT: &str = r#"
workload:
  max_duration: 20s
  phases:
    - name: warmup
      type: constant
      duration: 10s
      start_rps: 1
    - name: climb
      type: variable
      start_offset: 10s
      duration: 10s
      start_rps: 10
      end_rps: 100
      step: 10
target:
  url: http://localhost:8080/increment
  timeout: 2s
  headers:
    content-type: application/json
payload:
  body: {"delta": 1}
output:
  path: out.csv
  flush_interval: 500ms
dispatch:
  max_in_flight: 500
"#;

    const GENERATED: &str = r#"
workload:
  generate_workload: true
  seed: 42
  max_duration: 20s
  patterns:
    - name: increment
      phase_count: {min: 1, max: 10}
      constant_likelihood: 0.5
      ramping_likelihood: 0.5
      parameters:
        start_rps: {min: 1, max: 10}
        end_rps: {min: 20, max: 30}
        step: {min: 1, max: 10}
target:
  url: http://localhost:8080/increment
"#;

    #[test]
    fn test_explicit_config() {
        let config: FileConfig = serde_yaml::from_str(EXPLICIT).unwrap();
        let phases = config.validate().unwrap();

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[1].start_offset, Duration::from_secs(10));
        assert_eq!(config.output.flush_interval, Duration::from_millis(500));
        assert_eq!(config.dispatch.max_in_flight, Some(500));
        assert_eq!(config.dispatch.drain_timeout, Duration::from_secs(30));
        assert_eq!(config.target.headers["content-type"], "application/json");
    }

    #[test]
    fn test_generated_config_defaults() {
        let config: FileConfig = serde_yaml::from_str(GENERATED).unwrap();
        let phases = config.validate().unwrap();

        assert!(!phases.is_empty());
        assert!(phases.len() <= 10);
        assert_eq!(config.output.path, PathBuf::from("results.csv"));
        assert!(config.payload.body.is_none());
        assert_eq!(config.dispatch, DispatchConfig::default());
    }

    #[test]
    fn test_invalid_weights_fail_validation() {
        let yaml = GENERATED.replace(
            "ramping_likelihood: 0.5\n",
            "ramping_likelihood: 0.5\n      weight: 0.9\n",
        );
        let config: FileConfig = serde_yaml::from_str(&yaml).unwrap();

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "pattern weights must sum to 1.0");
    }

    #[test]
    fn test_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"n\": 1}}").unwrap();
        writeln!(file, "{{\"n\": 2}}").unwrap();

        let payload = PayloadConfig {
            body: None,
            file: Some(file.path().to_path_buf()),
        };
        let supplier = payload.supplier().unwrap();
        assert_eq!(supplier.next()["n"], 1);
        assert_eq!(supplier.next()["n"], 2);
        assert_eq!(supplier.next()["n"], 1);
    }

    #[test]
    fn test_payload_both_rejected() {
        let payload = PayloadConfig {
            body: Some(Value::Null),
            file: Some(PathBuf::from("payloads.jsonl")),
        };
        assert!(payload.supplier().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/no/such/loadgen.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}

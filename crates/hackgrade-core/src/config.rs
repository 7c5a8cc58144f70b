//! Grader configuration.
//!
//! Sources, later wins: built-in defaults, an optional YAML file, environment
//! variables. The CLI applies its flags on top.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `HACKGRADE_MODEL` / `OPENAI_MODEL` | Primary backend model |
//! | `HACKGRADE_SECONDARY_MODEL` | Second model for dual-model grading |
//! | `HACKGRADE_USE_LLM` | `0`/`false` selects the heuristic scorer |
//! | `HACKGRADE_WORKERS` | Answers graded concurrently (max 10) |
//! | `HACKGRADE_SC_RUNS` | Self-consistency runs per answer (1-9) |
//! | `HACKGRADE_VARIANT_WORKERS` | Variant runs in flight per answer |
//! | `HACKGRADE_MAX_CONCURRENT_CALLS` | Process-wide backend call cap |
//! | `HACKGRADE_MAX_RETRIES` | Retries per backend call |
//! | `HACKGRADE_BASE_DELAY_MS` | First backoff delay |
//! | `HACKGRADE_TIMEOUT_SECS` | Transport timeout per backend call |
//! | `OPENAI_BASE_URL` | Backend API base URL |
//! | `OPENAI_API_KEY` | Backend API key |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::retry::RetryPolicy;
use crate::scoring::Weights;

pub const MAX_WORKERS: usize = 10;
pub const MIN_SC_RUNS: u32 = 1;
pub const MAX_SC_RUNS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Enables dual-model grading when set.
    #[serde(default)]
    pub secondary_model: Option<String>,

    #[serde(default = "default_true")]
    pub use_llm: bool,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_sc_runs")]
    pub sc_runs: u32,

    #[serde(default = "default_variant_workers")]
    pub variant_workers: usize,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub weights: Weights,

    /// Criterion spread (max - min) above which runs count as inconsistent.
    #[serde(default = "default_inconsistency_threshold")]
    pub inconsistency_threshold: f64,

    /// All three criteria at or above this value are flagged as suspicious.
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: f64,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    6
}

fn default_sc_runs() -> u32 {
    5
}

fn default_variant_workers() -> usize {
    3
}

fn default_max_concurrent_calls() -> usize {
    crate::limiter::DEFAULT_MAX_CONCURRENT_CALLS
}

fn default_timeout() -> u64 {
    60
}

fn default_inconsistency_threshold() -> f64 {
    2.0
}

fn default_suspicious_threshold() -> f64 {
    4.5
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            secondary_model: None,
            use_llm: true,
            workers: default_workers(),
            sc_runs: default_sc_runs(),
            variant_workers: default_variant_workers(),
            max_concurrent_calls: default_max_concurrent_calls(),
            retry: RetryPolicy::default(),
            timeout_secs: default_timeout(),
            weights: Weights::default(),
            inconsistency_threshold: default_inconsistency_threshold(),
            suspicious_threshold: default_suspicious_threshold(),
            api_base: default_api_base(),
            api_key: None,
        }
    }
}

impl GraderConfig {
    /// Parse a YAML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> GradeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GradeError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| GradeError::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Defaults, then the optional file, then the environment.
    pub fn load(path: Option<&Path>) -> GradeResult<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> GradeResult<Self> {
        Self::load(None)
    }

    pub fn with_env_overrides(mut self) -> GradeResult<Self> {
        let model = env_string("HACKGRADE_MODEL").or_else(|| env_string("OPENAI_MODEL"));
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(model) = env_string("HACKGRADE_SECONDARY_MODEL") {
            self.secondary_model = Some(model);
        }
        if let Some(flag) = env_string("HACKGRADE_USE_LLM") {
            self.use_llm = parse_flag("HACKGRADE_USE_LLM", &flag)?;
        }
        if let Some(v) = env_parsed("HACKGRADE_WORKERS")? {
            self.workers = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_SC_RUNS")? {
            self.sc_runs = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_VARIANT_WORKERS")? {
            self.variant_workers = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_MAX_CONCURRENT_CALLS")? {
            self.max_concurrent_calls = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_MAX_RETRIES")? {
            self.retry.max_retries = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_BASE_DELAY_MS")? {
            self.retry.base_delay_ms = v;
        }
        if let Some(v) = env_parsed("HACKGRADE_TIMEOUT_SECS")? {
            self.timeout_secs = v;
        }
        if let Some(url) = env_string("OPENAI_BASE_URL") {
            self.api_base = url;
        }
        if let Some(key) = env_string("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        Ok(self)
    }

    pub fn validate(&self) -> GradeResult<()> {
        let bad = |message: String| Err(GradeError::Config { message });
        if self.model.trim().is_empty() {
            return bad("model must not be empty".to_string());
        }
        if self.max_concurrent_calls == 0 {
            return bad("max_concurrent_calls must be at least 1".to_string());
        }
        if self.timeout_secs == 0 {
            return bad("timeout_secs must be at least 1".to_string());
        }
        for (name, value) in [
            ("inconsistency_threshold", self.inconsistency_threshold),
            ("suspicious_threshold", self.suspicious_threshold),
            ("retry.max_jitter", self.retry.max_jitter),
        ] {
            if !value.is_finite() || value < 0.0 {
                return bad(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }

    /// Models to run each variant set against, primary first.
    pub fn models(&self) -> Vec<String> {
        let mut models = vec![self.model.clone()];
        if let Some(second) = self.secondary_model.as_ref().filter(|m| !m.trim().is_empty()) {
            if second != &self.model {
                models.push(second.clone());
            }
        }
        models
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }

    pub fn effective_sc_runs(&self) -> u32 {
        clamp_runs(self.sc_runs)
    }

    pub fn effective_variant_workers(&self) -> usize {
        self.variant_workers.clamp(1, MAX_SC_RUNS as usize)
    }
}

pub fn clamp_runs(runs: u32) -> u32 {
    runs.clamp(MIN_SC_RUNS, MAX_SC_RUNS)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str) -> GradeResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| GradeError::Config {
            message: format!("{key}={raw}: {e}"),
        }),
        None => Ok(None),
    }
}

fn parse_flag(key: &str, raw: &str) -> GradeResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GradeError::Config {
            message: format!("{key}={raw}: expected a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_KEYS: [&str; 6] = [
        "HACKGRADE_MODEL",
        "OPENAI_MODEL",
        "HACKGRADE_SECONDARY_MODEL",
        "HACKGRADE_USE_LLM",
        "HACKGRADE_WORKERS",
        "HACKGRADE_SC_RUNS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = GraderConfig::default();
        assert_eq!(cfg.model, "gpt-4o-mini");
        assert_eq!(cfg.max_concurrent_calls, 6);
        assert_eq!(cfg.retry.max_retries, 4);
        assert_eq!(cfg.inconsistency_threshold, 2.0);
        assert_eq!(cfg.models(), vec!["gpt-4o-mini".to_string()]);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_yaml_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "model: gpt-4o\nsecondary_model: gpt-4.1-mini\nsc_runs: 3\nretry:\n  base_delay_ms: 50\nweights:\n  completeness: 1\n  conciseness: 1\n  correctness: 2"
        )
        .unwrap();
        let cfg = GraderConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.sc_runs, 3);
        assert_eq!(cfg.retry.base_delay_ms, 50);
        assert_eq!(cfg.retry.max_retries, 4);
        assert_eq!(cfg.models(), vec!["gpt-4o".to_string(), "gpt-4.1-mini".to_string()]);
        assert_eq!(cfg.workers, 6);
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers: [not, a, number]").unwrap();
        assert!(matches!(
            GraderConfig::from_file(file.path()),
            Err(GradeError::Config { .. })
        ));
    }

    #[test]
    fn test_clamping() {
        let cfg = GraderConfig {
            workers: 64,
            sc_runs: 0,
            ..GraderConfig::default()
        };
        assert_eq!(cfg.effective_workers(), MAX_WORKERS);
        assert_eq!(cfg.effective_sc_runs(), 1);
        assert_eq!(clamp_runs(20), 9);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let cfg = GraderConfig {
            inconsistency_threshold: f64::NAN,
            ..GraderConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_duplicate_secondary_model_ignored() {
        let cfg = GraderConfig {
            secondary_model: Some("gpt-4o-mini".to_string()),
            ..GraderConfig::default()
        };
        assert_eq!(cfg.models().len(), 1);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("OPENAI_MODEL", "gpt-3.5-turbo");
        std::env::set_var("HACKGRADE_USE_LLM", "false");
        std::env::set_var("HACKGRADE_WORKERS", "2");
        let cfg = GraderConfig::from_env().unwrap();
        assert_eq!(cfg.model, "gpt-3.5-turbo");
        assert!(!cfg.use_llm);
        assert_eq!(cfg.workers, 2);

        std::env::set_var("HACKGRADE_MODEL", "gpt-4o");
        assert_eq!(GraderConfig::from_env().unwrap().model, "gpt-4o");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_garbage_is_config_error() {
        clear_env();
        std::env::set_var("HACKGRADE_SC_RUNS", "many");
        let err = GraderConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("HACKGRADE_SC_RUNS"));
        clear_env();
    }
}

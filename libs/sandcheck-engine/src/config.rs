// Sandbox configuration for sandcheck
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/sandbox.json";

/// CFS period used to express `cpu_limit` as a hard quota.
pub const CPU_PERIOD_US: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub image: String,
    pub timeout_ms: u64,
    pub memory_limit_mb: u32,
    /// Fraction of one CPU the sandbox may use (0.5 = half a core).
    pub cpu_limit: f32,
    pub pids_limit: i64,
    pub tmpfs_size_mb: u32,
    pub working_dir: String,
    pub max_parallel_tests: usize,
    /// Console bytes kept per run; anything past this is discarded.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "python:3.9-slim".to_string(),
            timeout_ms: 5000,
            memory_limit_mb: 128,
            cpu_limit: 0.5,
            pids_limit: 64,
            tmpfs_size_mb: 16,
            working_dir: "/tmp".to_string(),
            max_parallel_tests: 1,
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Load from a JSON file. Fields missing from the file keep their defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Sandbox config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read sandbox.json")?;

        let config: SandboxConfig = serde_json::from_str(&content)
            .context("Failed to parse sandbox.json")?;

        config.validate()?;
        Ok(config)
    }

    /// Load `config/sandbox.json` if present, otherwise defaults, then apply
    /// environment overrides.
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let config = if default_path.exists() {
            Self::load(default_path)?
        } else {
            Self::default()
        };

        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SANDCHECK_*` overrides read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(image) = lookup("SANDCHECK_IMAGE") {
            self.image = image;
        }
        if let Some(value) = lookup("SANDCHECK_TIMEOUT_MS") {
            self.timeout_ms = value
                .parse()
                .with_context(|| format!("Invalid SANDCHECK_TIMEOUT_MS: {}", value))?;
        }
        if let Some(value) = lookup("SANDCHECK_MEMORY_MB") {
            self.memory_limit_mb = value
                .parse()
                .with_context(|| format!("Invalid SANDCHECK_MEMORY_MB: {}", value))?;
        }
        if let Some(value) = lookup("SANDCHECK_CPU_LIMIT") {
            self.cpu_limit = value
                .parse()
                .with_context(|| format!("Invalid SANDCHECK_CPU_LIMIT: {}", value))?;
        }
        if let Some(value) = lookup("SANDCHECK_MAX_PARALLEL_TESTS") {
            self.max_parallel_tests = value
                .parse()
                .with_context(|| format!("Invalid SANDCHECK_MAX_PARALLEL_TESTS: {}", value))?;
        }
        if let Some(value) = lookup("SANDCHECK_MAX_OUTPUT_BYTES") {
            self.max_output_bytes = value
                .parse()
                .with_context(|| format!("Invalid SANDCHECK_MAX_OUTPUT_BYTES: {}", value))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            bail!("Sandbox image must not be empty");
        }
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be greater than zero");
        }
        if self.memory_limit_mb < 16 {
            bail!("memory_limit_mb must be at least 16, got {}", self.memory_limit_mb);
        }
        if !(self.cpu_limit > 0.0) {
            bail!("cpu_limit must be positive, got {}", self.cpu_limit);
        }
        if self.pids_limit <= 0 {
            bail!("pids_limit must be positive, got {}", self.pids_limit);
        }
        if self.max_parallel_tests == 0 {
            bail!("max_parallel_tests must be at least 1");
        }
        if self.max_output_bytes < 1024 {
            bail!("max_output_bytes must be at least 1024, got {}", self.max_output_bytes);
        }
        Ok(())
    }

    pub fn memory_limit_bytes(&self) -> i64 {
        (self.memory_limit_mb as i64) * 1024 * 1024
    }

    pub fn cpu_quota_us(&self) -> i64 {
        ((self.cpu_limit as f64) * CPU_PERIOD_US as f64).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SandboxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory_limit_bytes(), 128 * 1024 * 1024);
        assert_eq!(config.cpu_quota_us(), 50_000);
        assert_eq!(config.max_parallel_tests, 1);
        assert_eq!(config.max_output_bytes, 1024 * 1024);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timeout_ms": 2000, "image": "python:3.12-slim"}}"#).unwrap();

        let config = SandboxConfig::load(file.path()).unwrap();

        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.image, "python:3.12-slim");
        assert_eq!(config.memory_limit_mb, 128);
    }

    #[test]
    fn test_rejects_tiny_output_cap() {
        let config = SandboxConfig {
            max_output_bytes: 10,
            ..SandboxConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SandboxConfig::load(Path::new("does/not/exist.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"timeout_ms": 0}}"#).unwrap();
        assert!(SandboxConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SANDCHECK_TIMEOUT_MS", "1500"),
            ("SANDCHECK_CPU_LIMIT", "0.25"),
            ("SANDCHECK_MAX_PARALLEL_TESTS", "4"),
            ("SANDCHECK_MAX_OUTPUT_BYTES", "65536"),
        ]);

        let config = SandboxConfig::default()
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.timeout_ms, 1500);
        assert_eq!(config.cpu_quota_us(), 25_000);
        assert_eq!(config.max_parallel_tests, 4);
        assert_eq!(config.max_output_bytes, 65536);
        assert_eq!(config.image, "python:3.9-slim");
    }

    #[test]
    fn test_env_override_parse_error() {
        let result = SandboxConfig::default()
            .apply_env(|key| (key == "SANDCHECK_MEMORY_MB").then(|| "lots".to_string()));
        assert!(result.is_err());
    }
}

//! Harness configuration
//!
//! Loaded from `swe-harness.toml` when present, otherwise built from
//! defaults. Every table and field has a default so a bare config file (or
//! none at all) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default evaluation timeout in seconds
const DEFAULT_EVAL_TIMEOUT: u64 = 1800;

/// Image prefix for SWE-bench per-instance evaluation images
const DEFAULT_IMAGE_PREFIX: &str = "swebench/sweb.eval.x86_64.";

/// Complete harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarnessConfig {
    /// Working directories
    #[serde(default)]
    pub dirs: DirsConfig,
    /// Run defaults
    #[serde(default)]
    pub run: RunSettings,
    /// Docker limits for evaluation containers
    #[serde(default)]
    pub docker: DockerSettings,
}

/// Working directories used by the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirsConfig {
    /// Predictions JSONL files, one per run
    pub predictions: PathBuf,
    /// Run results (results.json, results.csv, results.md)
    pub results: PathBuf,
    /// Per-instance evaluation logs
    pub evaluation_results: PathBuf,
    /// Git clones and per-instance worktrees
    pub workspaces: PathBuf,
    /// Downloaded dataset files
    pub cache: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        let cache = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("swe-harness");
        Self {
            predictions: PathBuf::from("predictions"),
            results: PathBuf::from("results"),
            evaluation_results: PathBuf::from("evaluation_results"),
            workspaces: PathBuf::from("workspaces"),
            cache,
        }
    }
}

impl DirsConfig {
    /// Directories that must exist for a run, in check order
    pub fn all(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("predictions", self.predictions.as_path()),
            ("results", self.results.as_path()),
            ("evaluation_results", self.evaluation_results.as_path()),
            ("workspaces", self.workspaces.as_path()),
            ("cache", self.cache.as_path()),
        ]
    }
}

/// Defaults for `swe-bench run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// HuggingFace dataset identifier
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Dataset split
    #[serde(default = "default_split")]
    pub split: String,
    /// Default assistant backend
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Model override passed to the backend (backend default when None)
    #[serde(default)]
    pub model: Option<String>,
    /// Per-instance prompt timeout in seconds (each backend's own default
    /// when unset; cline gets longer than the others)
    #[serde(default)]
    pub prompt_timeout_secs: Option<u64>,
    /// Multiplier applied to all timeouts
    #[serde(default = "default_timeout_multiplier")]
    pub timeout_multiplier: f64,
    /// Context length (k) to select for LongCodeBench datasets
    #[serde(default)]
    pub context_length: Option<u32>,
    /// Byte cap for inlined context files
    #[serde(default = "default_context_bytes")]
    pub max_context_bytes: usize,
}

fn default_dataset() -> String {
    "princeton-nlp/SWE-bench_Lite".to_string()
}
fn default_split() -> String {
    "test".to_string()
}
fn default_backend() -> String {
    "claude".to_string()
}
fn default_timeout_multiplier() -> f64 {
    1.0
}
fn default_context_bytes() -> usize {
    256 * 1024
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            split: default_split(),
            backend: default_backend(),
            model: None,
            prompt_timeout_secs: None,
            timeout_multiplier: default_timeout_multiplier(),
            context_length: None,
            max_context_bytes: default_context_bytes(),
        }
    }
}

/// Docker limits for evaluation containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Memory limit (e.g., "2g")
    #[serde(default = "default_memory")]
    pub memory_limit: String,
    /// CPU limit (1.0 = 1 CPU)
    #[serde(default = "default_cpus")]
    pub cpu_limit: f64,
    /// Network mode (none, bridge, host)
    #[serde(default = "default_network")]
    pub network_mode: String,
    /// Evaluation timeout in seconds
    #[serde(default = "default_eval_timeout")]
    pub eval_timeout_secs: u64,
    /// Image prefix for per-instance evaluation images
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
}

fn default_memory() -> String {
    "4g".to_string()
}
fn default_cpus() -> f64 {
    2.0
}
fn default_network() -> String {
    "bridge".to_string()
}
fn default_eval_timeout() -> u64 {
    DEFAULT_EVAL_TIMEOUT
}
fn default_image_prefix() -> String {
    DEFAULT_IMAGE_PREFIX.to_string()
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            memory_limit: default_memory(),
            cpu_limit: default_cpus(),
            network_mode: default_network(),
            eval_timeout_secs: default_eval_timeout(),
            image_prefix: default_image_prefix(),
        }
    }
}

impl HarnessConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if set, else `swe-harness.toml` if present,
    /// else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new("swe-harness.toml");
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate limits that serde defaults cannot enforce
    pub fn validate(&self) -> Result<()> {
        crate::docker::parse_memory_limit(&self.docker.memory_limit)
            .context("invalid docker.memory_limit")?;
        anyhow::ensure!(
            self.run.prompt_timeout_secs != Some(0),
            "run.prompt_timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.run.timeout_multiplier > 0.0,
            "run.timeout_multiplier must be positive"
        );
        anyhow::ensure!(
            self.docker.eval_timeout_secs > 0,
            "docker.eval_timeout_secs must be positive"
        );
        Ok(())
    }

    /// Create any missing working directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for (name, path) in self.dirs.all() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create {} directory: {}", name, path.display()))?;
        }
        Ok(())
    }

    /// Effective prompt timeout after the multiplier; `fallback` is the
    /// backend's own default
    pub fn prompt_timeout(&self, fallback: std::time::Duration) -> std::time::Duration {
        let base = self
            .run
            .prompt_timeout_secs
            .map(|s| s as f64)
            .unwrap_or_else(|| fallback.as_secs_f64());
        std::time::Duration::from_secs_f64(base * self.run.timeout_multiplier)
    }

    /// Effective evaluation timeout after the multiplier
    pub fn eval_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(
            self.docker.eval_timeout_secs as f64 * self.run.timeout_multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.run.dataset, "princeton-nlp/SWE-bench_Lite");
        assert_eq!(config.run.split, "test");
        assert_eq!(config.docker.memory_limit, "4g");
        assert_eq!(config.docker.eval_timeout_secs, 1800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [run]
            dataset = "Steefano/LCB"
            backend = "codex"
            context_length = 32

            [docker]
            memory_limit = "8g"
            network_mode = "none"
            "#,
        )
        .unwrap();

        assert_eq!(config.run.dataset, "Steefano/LCB");
        assert_eq!(config.run.backend, "codex");
        assert_eq!(config.run.context_length, Some(32));
        assert_eq!(config.docker.memory_limit, "8g");
        assert_eq!(config.docker.network_mode, "none");
        // untouched tables keep defaults
        assert_eq!(config.run.split, "test");
        assert_eq!(config.dirs.predictions, PathBuf::from("predictions"));
    }

    #[test]
    fn test_validate_rejects_bad_memory() {
        let mut config = HarnessConfig::default();
        config.docker.memory_limit = "lots".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_multiplier() {
        let mut config = HarnessConfig::default();
        config.run.timeout_multiplier = 2.0;
        let fallback = std::time::Duration::from_secs(600);
        assert_eq!(config.prompt_timeout(fallback).as_secs(), 1200);

        config.run.prompt_timeout_secs = Some(100);
        assert_eq!(config.prompt_timeout(fallback).as_secs(), 200);
    }
}

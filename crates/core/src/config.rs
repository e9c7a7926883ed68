use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Deadline for the whole run. Expiry is fatal.
    pub global_timeout_ms: u64,
    /// Deadline for each expensive step. Expiry skips that step only.
    pub step_timeout_ms: u64,
    pub sampling: SamplingConfig,
    pub needs: AnalysisNeeds,
    /// Target for regression and segmentation. Auto-selected when absent.
    pub target_column: Option<String>,
    /// Trees in the isolation-forest outlier scorer.
    pub isolation_trees: usize,
    /// Subsample size per isolation tree.
    pub isolation_sample: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            global_timeout_ms: 60_000,
            step_timeout_ms: 20_000,
            sampling: SamplingConfig::default(),
            needs: AnalysisNeeds::default(),
            target_column: None,
            isolation_trees: 100,
            isolation_sample: 256,
        }
    }
}

impl AnalysisConfig {
    /// Build config from `TABULA_*` environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            global_timeout_ms: env_parse("TABULA_GLOBAL_TIMEOUT_MS", d.global_timeout_ms),
            step_timeout_ms: env_parse("TABULA_STEP_TIMEOUT_MS", d.step_timeout_ms),
            sampling: SamplingConfig::from_env(),
            needs: AnalysisNeeds::from_env(),
            target_column: env_opt("TABULA_TARGET_COLUMN"),
            isolation_trees: env_parse("TABULA_ISOLATION_TREES", d.isolation_trees),
            isolation_sample: env_parse("TABULA_ISOLATION_SAMPLE", d.isolation_sample),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TabulaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.global_timeout_ms == 0 {
            return Err(TabulaError::Config("global_timeout_ms must be positive".into()));
        }
        if self.step_timeout_ms == 0 {
            return Err(TabulaError::Config("step_timeout_ms must be positive".into()));
        }
        if self.sampling.sample_size == 0 {
            return Err(TabulaError::Config("sampling.sample_size must be positive".into()));
        }
        if self.sampling.sample_size > self.sampling.sample_threshold {
            return Err(TabulaError::Config(format!(
                "sampling.sample_size ({}) exceeds sampling.sample_threshold ({})",
                self.sampling.sample_size, self.sampling.sample_threshold
            )));
        }
        if self.isolation_trees == 0 || self.isolation_sample < 2 {
            return Err(TabulaError::Config(
                "isolation forest needs at least one tree and a subsample of 2".into(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Analysis config:");
        tracing::info!(
            "  timeouts:  global={}ms, step={}ms",
            self.global_timeout_ms,
            self.step_timeout_ms
        );
        tracing::info!(
            "  sampling:  threshold={}, size={}, seed={}",
            self.sampling.sample_threshold,
            self.sampling.sample_size,
            self.sampling.seed
        );
        tracing::info!(
            "  target:    {}",
            self.target_column.as_deref().unwrap_or("(auto)")
        );
    }
}

// ── Sampling ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Datasets with more rows than this are downsampled once per run.
    pub sample_threshold: usize,
    /// Rows kept in the shared sample.
    pub sample_size: usize,
    /// Seed for every randomized step.
    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_threshold: 10_000,
            sample_size: 5_000,
            seed: 42,
        }
    }
}

impl SamplingConfig {
    fn from_env() -> Self {
        let d = Self::default();
        Self {
            sample_threshold: env_parse("TABULA_SAMPLE_THRESHOLD", d.sample_threshold),
            sample_size: env_parse("TABULA_SAMPLE_SIZE", d.sample_size),
            seed: env_parse("TABULA_SEED", d.seed),
        }
    }
}

// ── Needs map ─────────────────────────────────────────────────

/// Which analyses to run. Produced by an external needs detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisNeeds {
    pub distribution: bool,
    pub outliers: bool,
    pub correlation: bool,
    pub regression: bool,
    pub segmentation: bool,
    pub time_series: bool,
    pub ml_readiness: bool,
}

impl Default for AnalysisNeeds {
    fn default() -> Self {
        Self {
            distribution: true,
            outliers: true,
            correlation: true,
            regression: true,
            segmentation: true,
            time_series: true,
            ml_readiness: true,
        }
    }
}

impl AnalysisNeeds {
    /// Only per-column statistics.
    pub fn basic_only() -> Self {
        Self {
            distribution: false,
            outliers: false,
            correlation: false,
            regression: false,
            segmentation: false,
            time_series: false,
            ml_readiness: false,
        }
    }

    fn from_env() -> Self {
        let d = Self::default();
        Self {
            distribution: env_flag("TABULA_NEED_DISTRIBUTION", d.distribution),
            outliers: env_flag("TABULA_NEED_OUTLIERS", d.outliers),
            correlation: env_flag("TABULA_NEED_CORRELATION", d.correlation),
            regression: env_flag("TABULA_NEED_REGRESSION", d.regression),
            segmentation: env_flag("TABULA_NEED_SEGMENTATION", d.segmentation),
            time_series: env_flag("TABULA_NEED_TIME_SERIES", d.time_series),
            ml_readiness: env_flag("TABULA_NEED_ML_READINESS", d.ml_readiness),
        }
    }
}

//! Campaign configuration.
//!
//! Loaded from an optional TOML file, overridden by CLI flags, validated once,
//! and then passed by reference to everything that needs it. The same value is
//! recorded as the first line of the output log so a campaign can be replayed.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// How progress is shown while modules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Interactive progress bar.
    #[default]
    Bar,
    /// One plain line per update on stderr, for batch schedulers.
    Plain,
    Hidden,
}

impl ProgressMode {
    /// Pick the mode for this process; called once at start-up.
    ///
    /// Batch-cluster jobs (marked by `ACCESS_INFO`) get plain lines.
    pub fn detect(access_info: Option<&str>) -> Self {
        if access_info.is_some() {
            Self::Plain
        } else {
            Self::Bar
        }
    }
}

/// Options passed through to every driver invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Driver program and its leading arguments.
    pub command: Vec<String>,
    /// Entry function invoked in each module.
    pub function_name: String,
    /// Iterations per module (N).
    pub num_iterations: u32,
    /// Per-iteration timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum size of one output file in bytes.
    pub size_limit: u64,
    /// Maximum memory of one run in bytes.
    pub max_mem: u64,
    pub output_suffix: String,
    /// Fraction of the worst-case batch time after which the driver is killed.
    pub batch_timeout_scale: f64,
    /// Bytes of driver stdout/stderr kept for run-error records.
    pub capture_limit_bytes: usize,
}

/// Upper bound on a batch's wall-clock budget (one year).
pub const MAX_BATCH_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "driver.py".to_string()],
            function_name: "generate".to_string(),
            num_iterations: 100,
            timeout_secs: 2,
            size_limit: 50 * 1024 * 1024,
            max_mem: 1024 * 1024 * 1024,
            output_suffix: ".gif".to_string(),
            batch_timeout_scale: 0.25,
            capture_limit_bytes: 100_000,
        }
    }
}

impl DriverConfig {
    /// Wall-clock budget for one module's whole batch:
    /// `scale * timeout * seeds * iterations`, counting at least one seed.
    /// Saturates at [`MAX_BATCH_TIMEOUT`].
    pub fn batch_timeout(&self, seed_count: usize) -> Duration {
        let worst = self.timeout_secs as f64 * seed_count.max(1) as f64 * self.num_iterations as f64;
        Duration::try_from_secs_f64(self.batch_timeout_scale * worst)
            .map_or(MAX_BATCH_TIMEOUT, |budget| budget.min(MAX_BATCH_TIMEOUT))
    }
}

/// Seed-input corpus options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SeedConfig {
    /// Directory enumerated (recursively) for seed inputs.
    pub input_dir: Option<PathBuf>,
    /// Down-sample the enumeration to this many files.
    pub samples: Option<usize>,
    /// Resample every this many generations; `None` disables resampling.
    pub resample_iterations: Option<u32>,
}

impl SeedConfig {
    pub fn resample_every(&self) -> Option<NonZeroU32> {
        self.resample_iterations.and_then(NonZeroU32::new)
    }
}

/// Immutable parameters shared by every worker of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CampaignConfig {
    /// Root of the per-module working directories.
    pub output_dir: PathBuf,
    /// Maximum simultaneous modules; `None` means available parallelism.
    pub jobs: Option<usize>,
    /// Stop the campaign on the first scheduling-level failure.
    pub raise_errors: bool,
    /// Current generation, `gen<k>`.
    pub generation: String,
    /// Root of persisted per-generation state.
    pub run_dir: PathBuf,
    pub progress: ProgressMode,
    pub driver: DriverConfig,
    pub seeds: SeedConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            jobs: None,
            raise_errors: false,
            generation: "gen0".to_string(),
            run_dir: PathBuf::from("."),
            progress: ProgressMode::default(),
            driver: DriverConfig::default(),
            seeds: SeedConfig::default(),
        }
    }
}

impl CampaignConfig {
    pub fn validate(&self) -> Result<()> {
        let driver = &self.driver;
        if driver.command.is_empty() || driver.command[0].trim().is_empty() {
            return Err(anyhow!("driver.command must be a non-empty array"));
        }
        if driver.function_name.trim().is_empty() {
            return Err(anyhow!("driver.function_name must be set"));
        }
        if driver.num_iterations == 0 {
            return Err(anyhow!("driver.num_iterations must be > 0"));
        }
        if driver.timeout_secs == 0 {
            return Err(anyhow!("driver.timeout_secs must be > 0"));
        }
        if !(driver.batch_timeout_scale.is_finite() && driver.batch_timeout_scale > 0.0) {
            return Err(anyhow!("driver.batch_timeout_scale must be > 0"));
        }
        if self.jobs == Some(0) {
            return Err(anyhow!("jobs must be > 0"));
        }
        if self.seeds.resample_iterations == Some(0) {
            return Err(anyhow!("seeds.resample_iterations must be > 0"));
        }
        if self.seeds.samples == Some(0) {
            return Err(anyhow!("seeds.samples must be > 0"));
        }
        Ok(())
    }

    /// Concurrency bound, resolving `None` to the machine's parallelism.
    pub fn job_limit(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CampaignConfig::default()`. Validation is
/// left to the caller, after CLI overrides are applied.
pub fn load_config(path: &Path) -> Result<CampaignConfig> {
    if !path.exists() {
        return Ok(CampaignConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CampaignConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

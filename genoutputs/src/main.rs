//! `genoutputs`: run every module listed on stdin through the driver and log
//! one classified record per attempt.
//!
//! Reads a leading module count and then one module path per line from stdin.
//! The output log goes to `--logfile` (followed by a statistics report on
//! stderr) or to stdout.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::warn;

use genoutputs::campaign::{run_campaign, summarize_log};
use genoutputs::io::config::{CampaignConfig, ProgressMode, load_config};
use genoutputs::io::driver::CommandDriver;
use genoutputs::io::module_list::ModuleList;
use genoutputs::logging;

#[derive(Parser, Debug)]
#[command(
    name = "genoutputs",
    version,
    about = "Drive generated fuzzing modules and classify every run"
)]
struct Cli {
    /// TOML config file; a missing file means defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Root of the per-module working directories.
    #[arg(short = 'O', long)]
    output_dir: Option<PathBuf>,
    /// Maximum modules running at once (default: available parallelism).
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
    /// Stop on the first failure outside the driver instead of logging it.
    #[arg(long)]
    raise_errors: bool,
    /// Write the output log here instead of stdout.
    #[arg(short = 'L', long)]
    logfile: Option<PathBuf>,
    /// Current generation, `gen<k>`.
    #[arg(short = 'g', long)]
    generation: Option<String>,
    /// Root of persisted per-generation seed lists.
    #[arg(long, env = "ELMFUZZ_RUNDIR")]
    run_dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,

    /// Entry function invoked in each module.
    #[arg(short = 'f', long)]
    function_name: Option<String>,
    /// Iterations per module.
    #[arg(short = 'n', long)]
    num_iterations: Option<u32>,
    /// Per-iteration timeout in seconds.
    #[arg(short = 't', long)]
    timeout: Option<u64>,
    /// Maximum size of one output file in bytes.
    #[arg(short = 'S', long)]
    size_limit: Option<u64>,
    /// Maximum memory of one run in bytes.
    #[arg(short = 'M', long)]
    max_mem: Option<u64>,
    #[arg(short = 's', long)]
    output_suffix: Option<String>,
    /// Driver program; repeat for its leading arguments.
    #[arg(long = "driver", value_name = "ARG", allow_hyphen_values = true)]
    driver: Vec<String>,

    /// Directory enumerated for seed inputs.
    #[arg(long)]
    seed_input_dir: Option<PathBuf>,
    /// Down-sample the seed inputs to this many files.
    #[arg(long)]
    seed_input_samples: Option<usize>,
    /// Resample the seed inputs every this many generations.
    #[arg(long)]
    resample_iterations: Option<u32>,

    /// Also compute output-file statistics after the campaign.
    #[arg(long)]
    filestats: bool,
    /// Only recompute statistics from an existing `--logfile`.
    #[arg(long, requires = "logfile")]
    stats_only: bool,
}

/// Layer CLI flags over the file config and validate the result.
fn apply_overrides(mut base: CampaignConfig, cli: &Cli, access_info: Option<&str>) -> Result<CampaignConfig> {
    if let Some(output_dir) = &cli.output_dir {
        base.output_dir = output_dir.clone();
    }
    if cli.jobs.is_some() {
        base.jobs = cli.jobs;
    }
    if cli.raise_errors {
        base.raise_errors = true;
    }
    if let Some(generation) = &cli.generation {
        base.generation = generation.clone();
    }
    if let Some(run_dir) = &cli.run_dir {
        base.run_dir = run_dir.clone();
    }
    base.progress = resolve_progress(cli.progress, access_info, base.progress);

    let driver = &mut base.driver;
    if let Some(function_name) = &cli.function_name {
        driver.function_name = function_name.clone();
    }
    if let Some(n) = cli.num_iterations {
        driver.num_iterations = n;
    }
    if let Some(timeout) = cli.timeout {
        driver.timeout_secs = timeout;
    }
    if let Some(size_limit) = cli.size_limit {
        driver.size_limit = size_limit;
    }
    if let Some(max_mem) = cli.max_mem {
        driver.max_mem = max_mem;
    }
    if let Some(suffix) = &cli.output_suffix {
        driver.output_suffix = suffix.clone();
    }
    if !cli.driver.is_empty() {
        driver.command = cli.driver.clone();
    }

    if let Some(dir) = &cli.seed_input_dir {
        base.seeds.input_dir = Some(dir.clone());
    }
    if cli.seed_input_samples.is_some() {
        base.seeds.samples = cli.seed_input_samples;
    }
    if cli.resample_iterations.is_some() {
        base.seeds.resample_iterations = cli.resample_iterations;
    }

    base.validate()?;
    Ok(base)
}

/// Explicit flag, then the batch-cluster marker, then the config file.
fn resolve_progress(flag: Option<ProgressMode>, access_info: Option<&str>, configured: ProgressMode) -> ProgressMode {
    match (flag, access_info) {
        (Some(mode), _) => mode,
        (None, Some(_)) => ProgressMode::detect(access_info),
        (None, None) => configured,
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let access_info = std::env::var("ACCESS_INFO").ok();

    if cli.stats_only {
        let log_path = cli
            .logfile
            .as_deref()
            .ok_or_else(|| anyhow!("--stats-only requires --logfile"))?;
        let progress = resolve_progress(cli.progress, access_info.as_deref(), ProgressMode::default());
        let summary = summarize_log(log_path, true, progress)?;
        eprint!("{}", summary.render());
        return Ok(());
    }

    let base = match &cli.config {
        Some(path) => load_config(path)?,
        None => CampaignConfig::default(),
    };
    let config = apply_overrides(base, &cli, access_info.as_deref())?;

    let modules = ModuleList::open(BufReader::new(io::stdin()))?;
    let expected = modules.expected;
    let list_failure = modules.failure();
    let driver = CommandDriver::from_config(&config.driver);
    let mut rng = rand::thread_rng();

    let Some(log_path) = &cli.logfile else {
        if cli.filestats {
            warn!("--filestats needs --logfile; skipping file statistics");
        }
        run_campaign(&driver, modules, expected, &config, io::stdout().lock(), &mut rng)?;
        return list_failure.check();
    };

    let file = File::create(log_path).with_context(|| format!("create {}", log_path.display()))?;
    run_campaign(&driver, modules, expected, &config, BufWriter::new(file), &mut rng)?;
    list_failure.check()?;

    let summary = summarize_log(log_path, cli.filestats, config.progress)?;
    eprint!("{}", summary.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("genoutputs").chain(args.iter().copied()))
    }

    #[test]
    fn parse_driver_flags() {
        let cli = parse(&["-n", "10", "-t", "3", "-s", ".png", "-f", "fuzz", "-j", "4"]);
        assert_eq!(cli.num_iterations, Some(10));
        assert_eq!(cli.timeout, Some(3));
        assert_eq!(cli.output_suffix.as_deref(), Some(".png"));
        assert_eq!(cli.function_name.as_deref(), Some("fuzz"));
        assert_eq!(cli.jobs, Some(4));
    }

    #[test]
    fn stats_only_requires_logfile() {
        assert!(Cli::try_parse_from(["genoutputs", "--stats-only"]).is_err());
        let cli = parse(&["--stats-only", "-L", "gen1.jsonl"]);
        assert!(cli.stats_only);
    }

    #[test]
    fn repeated_driver_flag_builds_command() {
        let cli = parse(&["--driver", "python3", "--driver", "-u", "--driver", "drv.py"]);
        let config = apply_overrides(CampaignConfig::default(), &cli, None).expect("config");
        assert_eq!(config.driver.command, vec!["python3", "-u", "drv.py"]);
    }

    #[test]
    fn flags_override_file_values() {
        let mut base = CampaignConfig::default();
        base.driver.num_iterations = 50;
        base.jobs = Some(8);
        let cli = parse(&["-n", "5", "--resample-iterations", "3", "--seed-input-samples", "2"]);
        let config = apply_overrides(base, &cli, None).expect("config");
        assert_eq!(config.driver.num_iterations, 5);
        assert_eq!(config.jobs, Some(8));
        assert_eq!(config.seeds.resample_every(), NonZeroU32::new(3));
        assert_eq!(config.seeds.samples, Some(2));
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let cli = parse(&["-n", "0"]);
        assert!(apply_overrides(CampaignConfig::default(), &cli, None).is_err());
    }

    #[test]
    fn progress_resolution_order() {
        assert_eq!(
            resolve_progress(Some(ProgressMode::Hidden), Some("x"), ProgressMode::Bar),
            ProgressMode::Hidden
        );
        assert_eq!(resolve_progress(None, Some("x"), ProgressMode::Bar), ProgressMode::Plain);
        assert_eq!(resolve_progress(None, None, ProgressMode::Hidden), ProgressMode::Hidden);
    }
}

//! One invocation of the campaign: record the configuration, resolve the
//! generation's seed inputs, run every module, then summarize the log.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{info, instrument};

use crate::core::filestats::{self, FileStatsReport};
use crate::core::report::render_stats;
use crate::core::stats::CampaignStats;
use crate::io::config::{CampaignConfig, ProgressMode};
use crate::io::driver::Driver;
use crate::io::filestats::{collect, sidecar_path, write_sidecar};
use crate::io::output_log::{OutputLog, read_log};
use crate::io::seeds::resolve_seeds;
use crate::scheduler::{PoolSummary, run_pool};

/// Run all `modules` for the configured generation, writing the log to `out`.
///
/// The header line is written before anything else so a log always records
/// the configuration that produced it.
#[instrument(skip_all, fields(generation = %config.generation))]
pub fn run_campaign<D, I, W, R>(
    driver: &D,
    modules: I,
    expected: u64,
    config: &CampaignConfig,
    out: W,
    rng: &mut R,
) -> Result<PoolSummary>
where
    D: Driver + Sync + ?Sized,
    I: IntoIterator<Item = PathBuf>,
    I::IntoIter: Send,
    W: Write,
    R: Rng + ?Sized,
{
    config.validate()?;
    let mut log = OutputLog::create(out, config)?;
    let seeds = resolve_seeds(config, rng).context("resolve seed inputs")?;
    info!(seeds = seeds.len(), expected, "starting campaign");
    run_pool(driver, modules, expected, &seeds, config, &mut log)
}

/// Statistics recomputed from a finished log.
#[derive(Debug)]
pub struct LogSummary {
    pub stats: CampaignStats,
    pub file_stats: Option<FileStatsReport>,
    /// Where the sidecar was written, when file statistics were computed.
    pub sidecar: Option<PathBuf>,
}

impl LogSummary {
    /// Human-readable report: kind counts, then file statistics if present.
    pub fn render(&self) -> String {
        let mut text = render_stats(&self.stats);
        if let Some(report) = &self.file_stats {
            text.push_str(&filestats::render(report));
        }
        if let Some(path) = &self.sidecar {
            text.push_str(&format!("Wrote file stats to {}\n", path.display()));
        }
        text
    }
}

/// Recompute statistics from the log at `log_path`.
///
/// With `file_stats`, also measures every module's outputs and writes the
/// `.filestats.json` sidecar. Iteration count, output suffix and output
/// directory come from the log header.
#[instrument(skip_all, fields(log = %log_path.display(), file_stats))]
pub fn summarize_log(log_path: &Path, file_stats: bool, progress: ProgressMode) -> Result<LogSummary> {
    let logged = read_log(log_path)?;
    let args = &logged.config;
    let stats = CampaignStats::from_records(&logged.records, u64::from(args.driver.num_iterations));

    let (file_stats, sidecar) = if file_stats {
        let report = collect(
            &logged.records,
            &args.output_dir,
            &args.driver.output_suffix,
            progress,
        )?;
        let path = sidecar_path(log_path);
        write_sidecar(&path, &report)?;
        (Some(report), Some(path))
    } else {
        (None, None)
    };

    Ok(LogSummary {
        stats,
        file_stats,
        sidecar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::ResultKind;
    use crate::test_support::{Fixture, ScriptedDriver, ScriptedRun, log_records};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;

    #[test]
    fn header_precedes_records() {
        let fixture = Fixture::new();
        let module = fixture.module("var_0000.complete.py");
        let mut config = fixture.config(2);
        config.seeds.input_dir = Some(fixture.seeds(2));
        let driver = ScriptedDriver::new().with(
            "var_0000.complete.py",
            ScriptedRun::records(vec![ResultKind::Success; 2]),
        );
        let mut out = Vec::new();
        run_campaign(&driver, vec![module], 1, &config, &mut out, &mut StdRng::seed_from_u64(1))
            .expect("campaign");

        let first: serde_json::Value =
            serde_json::from_str(String::from_utf8_lossy(&out).lines().next().expect("header"))
                .expect("json");
        assert_eq!(first["data"]["args"]["driver"]["num_iterations"], 2);
        assert_eq!(log_records(&out).len(), 2);

        let requests = driver.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].seed_inputs.split(';').count(), 2);
    }

    #[test]
    fn invalid_config_writes_nothing() {
        let fixture = Fixture::new();
        let mut config = fixture.config(0);
        config.seeds.input_dir = Some(fixture.seeds(1));
        let mut out = Vec::new();
        let result = run_campaign(
            &ScriptedDriver::new(),
            Vec::new(),
            0,
            &config,
            &mut out,
            &mut StdRng::seed_from_u64(1),
        );
        assert!(result.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn summary_is_derived_from_the_log() {
        let fixture = Fixture::new();
        let module = fixture.module("var_0000.infilled.py");
        let mut config = fixture.config(3);
        config.seeds.input_dir = Some(fixture.seeds(1));
        let driver = ScriptedDriver::new().with(
            "var_0000.infilled.py",
            ScriptedRun::records(vec![ResultKind::Success, ResultKind::Timeout]),
        );
        let log_path = fixture.path().join("gen0.jsonl");
        let file = fs::File::create(&log_path).expect("log file");
        run_campaign(&driver, vec![module], 1, &config, file, &mut StdRng::seed_from_u64(1))
            .expect("campaign");

        let summary = summarize_log(&log_path, true, ProgressMode::Hidden).expect("summary");
        let infilled = summary.stats.gentype("infilled");
        assert_eq!(infilled.get(&ResultKind::Success), 1);
        assert_eq!(infilled.get(&ResultKind::Timeout), 1);
        assert_eq!(infilled.get(&ResultKind::UnknownErr), 1);
        assert!(fixture.path().join("gen0.filestats.json").exists());
        let text = summary.render();
        assert!(text.starts_with("Stats:\n"));
        assert!(text.contains("File stats:"));
    }
}

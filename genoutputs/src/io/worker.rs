//! One module's batch: isolate, drive, clean up, repair the log.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::batch::{BatchInput, DriverLog, normalize_batch};
use crate::core::result::{ErrorInfo, OutcomeRecord};
use crate::io::config::DriverConfig;
use crate::io::driver::{Driver, DriverExit, DriverRequest};
use crate::io::seeds::SeedSet;

/// File name of the driver's private per-iteration log.
pub const DRIVER_LOG_NAME: &str = "logfile.json";
/// Sub-directory of the working directory that receives generated outputs.
pub const OUTPUT_SUBDIR: &str = "output";

/// A module scheduled for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleJob {
    pub module_path: PathBuf,
    /// Private working directory; created by the scheduler.
    pub worker_dir: PathBuf,
}

impl ModuleJob {
    pub fn module_str(&self) -> String {
        self.module_path.display().to_string()
    }
}

/// Run one module through the driver and return its normalized batch.
///
/// Subprocess and log failures become records. The only errors returned are
/// those that prevent the driver from being started (the module cannot be
/// copied into its working directory); the scheduler records those.
#[instrument(skip_all, fields(module = %job.module_path.display()))]
pub fn run_module<D: Driver + ?Sized>(
    driver: &D,
    job: &ModuleJob,
    seeds: &SeedSet,
    config: &DriverConfig,
) -> Result<Vec<OutcomeRecord>> {
    let module_str = job.module_str();
    let file_name = job
        .module_path
        .file_name()
        .ok_or_else(|| anyhow!("module path {} has no file name", module_str))?;
    let copied = job.worker_dir.join(file_name);
    fs::copy(&job.module_path, &copied).with_context(|| {
        format!("copy {} to {}", job.module_path.display(), copied.display())
    })?;

    let log_path = job.worker_dir.join(DRIVER_LOG_NAME);
    let request = DriverRequest {
        module_path: copied.clone(),
        output_dir: job.worker_dir.join(OUTPUT_SUBDIR),
        log_path: log_path.clone(),
        seed_inputs: seeds.joined(),
        function_name: config.function_name.clone(),
        num_iterations: config.num_iterations,
        timeout_secs: config.timeout_secs,
        size_limit: config.size_limit,
        max_mem: config.max_mem,
        output_suffix: config.output_suffix.clone(),
        batch_timeout: config.batch_timeout(seeds.len()),
    };

    let exit = driver.run(&request);
    debug!(?exit, "driver finished");
    let run_error = run_error_record(&exit, &module_str, &config.function_name);

    if let Err(err) = remove_if_exists(&copied) {
        warn!(err = %err, path = %copied.display(), "could not remove module copy");
    }

    let log = read_driver_log(&log_path);
    if matches!(log, DriverLog::Records(_))
        && let Err(err) = remove_if_exists(&log_path)
    {
        warn!(err = %err, path = %log_path.display(), "could not remove driver log");
    }

    Ok(normalize_batch(BatchInput {
        module_path: &module_str,
        function_name: &config.function_name,
        expected: config.num_iterations as usize,
        log,
        run_error,
    }))
}

fn run_error_record(exit: &DriverExit, module_path: &str, function_name: &str) -> Option<OutcomeRecord> {
    match exit {
        DriverExit::Completed | DriverExit::TimedOut => None,
        DriverExit::Failed {
            exit_code,
            stdout,
            stderr,
        } => {
            let message = match exit_code {
                Some(code) => format!("driver exited with status {code}"),
                None => "driver terminated by signal".to_string(),
            };
            Some(OutcomeRecord::run_error(
                module_path,
                function_name,
                ErrorInfo::new("CalledProcessError", message, module_path),
                Some(stdout.clone()),
                Some(stderr.clone()),
            ))
        }
        DriverExit::SpawnFailed(message) => Some(OutcomeRecord::run_error(
            module_path,
            function_name,
            ErrorInfo::new("SpawnError", message.clone(), module_path),
            None,
            None,
        )),
    }
}

/// Parse the driver's per-iteration log. Malformed lines are skipped.
pub fn read_driver_log(path: &Path) -> DriverLog {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(err = %err, path = %path.display(), "driver log unreadable");
            }
            return DriverLog::Missing;
        }
    };
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(err = %err, line = index + 1, path = %path.display(), "driver log read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutcomeRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(err = %err, line = index + 1, path = %path.display(), "skipping malformed driver record");
            }
        }
    }
    DriverLog::Records(records)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

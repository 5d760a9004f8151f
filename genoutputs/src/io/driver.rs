//! Driver abstraction for running one module's batch.
//!
//! The [`Driver`] trait decouples the worker from the external harness tool.
//! [`CommandDriver`] spawns the configured program; tests use scripted drivers
//! that write predetermined logs without spawning anything.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::io::config::DriverConfig;
use crate::io::process::{ProcessOutcome, run_with_timeout};

/// Everything one driver invocation needs.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    /// The worker's private copy of the module.
    pub module_path: PathBuf,
    /// Directory the driver writes generated outputs into.
    pub output_dir: PathBuf,
    /// Private per-iteration JSON log.
    pub log_path: PathBuf,
    /// Seed-input paths joined with `;`.
    pub seed_inputs: String,
    pub function_name: String,
    pub num_iterations: u32,
    pub timeout_secs: u64,
    pub size_limit: u64,
    pub max_mem: u64,
    pub output_suffix: String,
    /// Kill the driver once this much wall time has passed.
    pub batch_timeout: Duration,
}

/// How a driver invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverExit {
    Completed,
    /// Non-zero exit, with what the process printed.
    Failed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// Killed after `batch_timeout`.
    TimedOut,
    /// The driver program could not be started at all.
    SpawnFailed(String),
}

/// Abstraction over driver backends.
pub trait Driver {
    /// Run all iterations for one module; per-iteration results go to
    /// `request.log_path`. Never fails: every problem is a [`DriverExit`].
    fn run(&self, request: &DriverRequest) -> DriverExit;
}

/// Driver that spawns an external program.
#[derive(Debug, Clone)]
pub struct CommandDriver {
    /// Program followed by its leading arguments.
    pub command: Vec<String>,
    pub capture_limit_bytes: usize,
}

impl CommandDriver {
    pub fn from_config(config: &DriverConfig) -> Self {
        Self {
            command: config.command.clone(),
            capture_limit_bytes: config.capture_limit_bytes,
        }
    }

    /// Build the argument vector the driver expects after its leading args.
    pub fn arguments(request: &DriverRequest) -> Vec<String> {
        vec![
            "-n".to_string(),
            request.num_iterations.to_string(),
            "-o".to_string(),
            request.output_dir.display().to_string(),
            "-L".to_string(),
            request.log_path.display().to_string(),
            "-t".to_string(),
            request.timeout_secs.to_string(),
            "-S".to_string(),
            request.size_limit.to_string(),
            "-M".to_string(),
            request.max_mem.to_string(),
            "-s".to_string(),
            request.output_suffix.clone(),
            "-i".to_string(),
            request.seed_inputs.clone(),
            request.module_path.display().to_string(),
            request.function_name.clone(),
        ]
    }
}

impl Driver for CommandDriver {
    #[instrument(skip_all, fields(module = %request.module_path.display()))]
    fn run(&self, request: &DriverRequest) -> DriverExit {
        let Some((program, leading)) = self.command.split_first() else {
            return DriverExit::SpawnFailed("driver command is empty".to_string());
        };
        let mut cmd = Command::new(program);
        cmd.args(leading).args(Self::arguments(request));
        debug!(program, batch_timeout_secs = request.batch_timeout.as_secs_f64(), "running driver");

        let run = match run_with_timeout(cmd, request.batch_timeout, self.capture_limit_bytes) {
            Ok(run) => run,
            Err(err) => return DriverExit::SpawnFailed(format!("{err:#}")),
        };
        match run.outcome {
            ProcessOutcome::Succeeded => DriverExit::Completed,
            ProcessOutcome::TimedOut => DriverExit::TimedOut,
            ProcessOutcome::Failed { exit_code } => {
                warn!(?exit_code, "driver exited with failure");
                DriverExit::Failed {
                    exit_code,
                    stdout: run.stdout_lossy(),
                    stderr: run.stderr_lossy(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DriverRequest {
        DriverRequest {
            module_path: PathBuf::from("out/var_0000.complete/var_0000.complete.py"),
            output_dir: PathBuf::from("out/var_0000.complete/output"),
            log_path: PathBuf::from("out/var_0000.complete/logfile.json"),
            seed_inputs: "a.gif;b.gif".to_string(),
            function_name: "generate".to_string(),
            num_iterations: 10,
            timeout_secs: 2,
            size_limit: 100,
            max_mem: 200,
            output_suffix: ".gif".to_string(),
            batch_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn arguments_follow_driver_contract() {
        let args = CommandDriver::arguments(&request());
        assert_eq!(
            args,
            vec![
                "-n",
                "10",
                "-o",
                "out/var_0000.complete/output",
                "-L",
                "out/var_0000.complete/logfile.json",
                "-t",
                "2",
                "-S",
                "100",
                "-M",
                "200",
                "-s",
                ".gif",
                "-i",
                "a.gif;b.gif",
                "out/var_0000.complete/var_0000.complete.py",
                "generate",
            ]
        );
    }

    #[test]
    fn empty_command_cannot_spawn() {
        let driver = CommandDriver {
            command: Vec::new(),
            capture_limit_bytes: 10,
        };
        assert!(matches!(driver.run(&request()), DriverExit::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_driver_reports_streams() {
        let driver = CommandDriver {
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo boom >&2; exit 4".to_string(),
                "driver".to_string(),
            ],
            capture_limit_bytes: 1024,
        };
        match driver.run(&request()) {
            DriverExit::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

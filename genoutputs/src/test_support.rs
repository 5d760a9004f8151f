//! Test-only helpers: a scripted driver and campaign fixtures.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::core::result::{OutcomeRecord, ResultKind};
use crate::io::config::{CampaignConfig, ProgressMode};
use crate::io::driver::{Driver, DriverExit, DriverRequest};

/// What the scripted driver does for one module.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    /// Raw lines written to the driver log; `None` leaves no log behind.
    pub lines: Option<Vec<String>>,
    pub exit: DriverExit,
    pub delay: Duration,
    pub panic: Option<String>,
}

impl ScriptedRun {
    /// Write one record per kind, then exit cleanly.
    pub fn records(kinds: Vec<ResultKind>) -> Self {
        let lines = kinds
            .into_iter()
            .map(|kind| {
                serde_json::json!({
                    "result_type": kind.as_str(),
                    "module_path": "driver-side-path.py",
                    "data": {"time_taken": 0.01, "memory_used": 1024},
                })
                .to_string()
            })
            .collect();
        Self {
            lines: Some(lines),
            ..Self::exit(DriverExit::Completed)
        }
    }

    /// Write these exact log lines, then exit cleanly.
    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines: Some(lines),
            ..Self::exit(DriverExit::Completed)
        }
    }

    /// Write no log; end with `exit`.
    pub fn exit(exit: DriverExit) -> Self {
        Self {
            lines: None,
            exit,
            delay: Duration::ZERO,
            panic: None,
        }
    }

    pub fn panicking(message: &str) -> Self {
        Self {
            panic: Some(message.to_string()),
            ..Self::exit(DriverExit::Completed)
        }
    }

    pub fn exiting(mut self, exit: DriverExit) -> Self {
        self.exit = exit;
        self
    }

    /// Sleep before writing anything.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Driver that replays scripted runs keyed by module file name.
///
/// Modules without a script behave like a driver that exits cleanly without
/// writing a log.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    runs: HashMap<String, ScriptedRun>,
    requests: Mutex<Vec<DriverRequest>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, run: ScriptedRun) -> Self {
        self.runs.insert(file_name.to_string(), run);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<DriverRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Driver for ScriptedDriver {
    fn run(&self, request: &DriverRequest) -> DriverExit {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        let file_name = request
            .module_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(run) = self.runs.get(&file_name) else {
            return DriverExit::Completed;
        };
        if !run.delay.is_zero() {
            thread::sleep(run.delay);
        }
        if let Some(message) = &run.panic {
            panic!("{message}");
        }
        if let Some(lines) = &run.lines {
            let mut contents = lines.join("\n");
            contents.push('\n');
            fs::write(&request.log_path, contents).expect("write scripted driver log");
        }
        run.exit.clone()
    }
}

/// Write a module file into `dir` (created if needed) and return its path.
pub fn write_module(dir: &Path, name: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create module dir");
    let path = dir.join(name);
    fs::write(&path, "def generate(seed):\n    return seed\n").expect("write module");
    path
}

/// Parse the records of an output log held in memory, skipping the header.
pub fn log_records(bytes: &[u8]) -> Vec<OutcomeRecord> {
    String::from_utf8_lossy(bytes)
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("parse log record"))
        .collect()
}

/// A temporary campaign layout: `mods/`, `out/`, `run/` and `seeds/`.
pub struct Fixture {
    pub root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn module(&self, name: &str) -> PathBuf {
        write_module(&self.path().join("mods"), name)
    }

    /// Write `count` distinct seed files and return the seed directory.
    pub fn seeds(&self, count: usize) -> PathBuf {
        let dir = self.path().join("seeds");
        fs::create_dir_all(&dir).expect("create seed dir");
        for i in 0..count {
            fs::write(dir.join(format!("seed{i:03}.gif")), format!("seed {i}")).expect("write seed");
        }
        dir
    }

    /// Config rooted in the fixture with `n` iterations and hidden progress.
    pub fn config(&self, n: u32) -> CampaignConfig {
        let mut config = CampaignConfig {
            output_dir: self.path().join("out"),
            run_dir: self.path().join("run"),
            progress: ProgressMode::Hidden,
            ..CampaignConfig::default()
        };
        config.driver.num_iterations = n;
        config
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

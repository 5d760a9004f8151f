//! Outcome kinds and the record shape every run result is normalized into.
//!
//! Records are what the output log stores, one JSON object per line. Driver
//! records may carry fields this crate does not know about; they are kept in
//! `extra` and written back out untouched.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Classification of one iteration (or of a whole failed batch).
///
/// Kinds the driver may report but this crate does not name are preserved as
/// [`ResultKind::Other`] so statistics can show them as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultKind {
    /// The iteration produced an output.
    Success,
    /// The driver's per-iteration timeout fired.
    Timeout,
    /// Catch-all failure: a driver-reported exception, or a scheduling-level
    /// failure raised outside the driver.
    Error,
    /// The driver's external crash-checking step failed.
    AflErr,
    /// The driver process exited non-zero (or could not be started).
    RunError,
    /// The driver produced no log at all.
    NoLogErr,
    /// The driver log held fewer records than iterations, with no other cause.
    UnknownErr,
    /// The module could not be loaded; one record stands for the whole batch.
    ImportError,
    Other(String),
}

impl ResultKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "Success",
            Self::Timeout => "Timeout",
            Self::Error => "Error",
            Self::AflErr => "AFLErr",
            Self::RunError => "RunError",
            Self::NoLogErr => "NoLogErr",
            Self::UnknownErr => "UnknownErr",
            Self::ImportError => "ImportError",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ResultKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Success" => Self::Success,
            "Timeout" => Self::Timeout,
            "Error" => Self::Error,
            "AFLErr" => Self::AflErr,
            "RunError" => Self::RunError,
            "NoLogErr" => Self::NoLogErr,
            "UnknownErr" => Self::UnknownErr,
            "ImportError" => Self::ImportError,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ResultKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ResultKind> for String {
    fn from(kind: ResultKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Kinds order by name so every report and bar iterates deterministically.
impl Ord for ResultKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for ResultKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Captured failure description attached to a record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorInfo {
    /// Short name of the failure (e.g. `CalledProcessError`, `panic`).
    pub exception: String,
    pub message: String,
    pub module_path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorInfo {
    pub fn new(exception: &str, message: impl Into<String>, module_path: &str) -> Self {
        Self {
            exception: exception.to_string(),
            message: message.into(),
            module_path: module_path.to_string(),
            extra: Map::new(),
        }
    }
}

/// Measurements of a run, or the captured streams of a failed driver process.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultInfo {
    pub time_taken: Option<f64>,
    pub memory_used: Option<u64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of the output log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub result_type: ResultKind,
    pub module_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResultInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OutcomeRecord {
    /// A record carrying only a kind, used for synthesized batch failures.
    pub fn synthetic(kind: ResultKind, module_path: &str, function_name: &str) -> Self {
        Self {
            result_type: kind,
            module_path: module_path.to_string(),
            function_name: Some(function_name.to_string()),
            error: None,
            data: None,
            extra: Map::new(),
        }
    }

    /// The driver process misbehaved; keep what it printed.
    pub fn run_error(
        module_path: &str,
        function_name: &str,
        error: ErrorInfo,
        stdout: Option<String>,
        stderr: Option<String>,
    ) -> Self {
        Self {
            error: Some(error),
            data: Some(ResultInfo {
                stdout,
                stderr,
                ..ResultInfo::default()
            }),
            ..Self::synthetic(ResultKind::RunError, module_path, function_name)
        }
    }

    /// A failure raised outside the driver (scheduling level).
    pub fn scheduling_error(module_path: &str, function_name: &str, error: ErrorInfo) -> Self {
        Self {
            error: Some(error),
            ..Self::synthetic(ResultKind::Error, module_path, function_name)
        }
    }

    pub fn is_import_error(&self) -> bool {
        self.result_type == ResultKind::ImportError
    }
}

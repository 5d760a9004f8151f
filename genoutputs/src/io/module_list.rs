//! Reading the module list produced by the variant generator.
//!
//! Format: a leading integer (the total module count), then one module path
//! per line. The list is consumed lazily so modules can be scheduled while
//! the generator is still producing them.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use tracing::error;

/// Lazily yields module paths after the count line has been read.
///
/// A read error ends the iteration; it is kept in the list's [`ReadFailure`]
/// so the caller can fail the run once the scheduled modules are done.
pub struct ModuleList<R> {
    reader: R,
    /// Count announced on the first line; used as the progress total.
    pub expected: u64,
    failure: ReadFailure,
}

/// Shared record of a read error that cut the module list short.
#[derive(Debug, Clone, Default)]
pub struct ReadFailure(Arc<Mutex<Option<String>>>);

impl ReadFailure {
    /// `Err` if the list ended on a read error rather than end of input.
    pub fn check(&self) -> Result<()> {
        let slot = self
            .0
            .lock()
            .map_err(|_| anyhow!("module list failure slot poisoned"))?;
        match slot.as_deref() {
            Some(message) => Err(anyhow!("read module list: {message}")),
            None => Ok(()),
        }
    }

    fn record(&self, err: &io::Error) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(err.to_string());
        }
    }

    fn is_set(&self) -> bool {
        self.0.lock().map(|slot| slot.is_some()).unwrap_or(true)
    }
}

impl<R: BufRead> ModuleList<R> {
    /// Read the leading count line.
    pub fn open(mut reader: R) -> Result<Self> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).context("read module count")?;
            if n == 0 {
                return Err(anyhow!("module list is empty; expected a leading count"));
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        let expected = line
            .trim()
            .parse::<u64>()
            .with_context(|| format!("module count {:?} is not an integer", line.trim()))?;
        Ok(Self {
            reader,
            expected,
            failure: ReadFailure::default(),
        })
    }

    /// Handle that outlives the list once it has been handed to the scheduler.
    pub fn failure(&self) -> ReadFailure {
        self.failure.clone()
    }
}

impl<R: BufRead> Iterator for ModuleList<R> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.failure.is_set() {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        return Some(PathBuf::from(trimmed));
                    }
                }
                Err(err) => {
                    error!(err = %err, "module list read failed; no further modules");
                    self.failure.record(&err);
                    return None;
                }
            }
        }
    }
}

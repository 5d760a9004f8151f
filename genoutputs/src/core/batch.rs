//! Turning whatever the driver left behind into exactly one batch of records.
//!
//! Rules, applied in order:
//! - no log and no run error: the batch failure is `NoLogErr`.
//! - a log holding exactly one `ImportError` record is the whole batch.
//! - otherwise the batch is padded up to `expected` with copies of the batch
//!   failure (`RunError`, `NoLogErr`, or `UnknownErr` when nothing else was
//!   diagnosed), and cut down to `expected` if the driver wrote too many.

use tracing::warn;

use crate::core::result::{OutcomeRecord, ResultKind};

/// Contents of the driver's per-iteration log.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverLog {
    /// The log file was never written.
    Missing,
    /// Parsed records, in file order.
    Records(Vec<OutcomeRecord>),
}

/// Everything the worker learned about one driver invocation.
#[derive(Debug, Clone)]
pub struct BatchInput<'a> {
    pub module_path: &'a str,
    pub function_name: &'a str,
    pub expected: usize,
    pub log: DriverLog,
    /// Synthesized when the driver process exited non-zero.
    pub run_error: Option<OutcomeRecord>,
}

/// Normalize one module's batch.
///
/// Returns exactly `expected` records, except for the single-`ImportError`
/// short-circuit which returns that one record.
pub fn normalize_batch(input: BatchInput<'_>) -> Vec<OutcomeRecord> {
    let BatchInput {
        module_path,
        function_name,
        expected,
        log,
        run_error,
    } = input;

    let (mut records, failure) = match log {
        DriverLog::Missing => {
            let failure = run_error.unwrap_or_else(|| {
                OutcomeRecord::synthetic(ResultKind::NoLogErr, module_path, function_name)
            });
            (Vec::new(), Some(failure))
        }
        DriverLog::Records(records) => (records, run_error),
    };

    for record in &mut records {
        record.module_path = module_path.to_string();
    }

    if records.len() == 1 && records[0].is_import_error() {
        return records;
    }

    if records.len() > expected {
        warn!(
            module_path,
            expected,
            found = records.len(),
            "driver wrote more records than iterations, dropping surplus"
        );
        records.truncate(expected);
    }

    if records.len() < expected {
        let filler = failure.unwrap_or_else(|| {
            OutcomeRecord::synthetic(ResultKind::UnknownErr, module_path, function_name)
        });
        records.resize(expected, filler);
    }

    records
}

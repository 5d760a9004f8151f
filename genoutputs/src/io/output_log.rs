//! The campaign's output log: a configuration header followed by one record
//! per line.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::result::OutcomeRecord;
use crate::io::config::CampaignConfig;

#[derive(Debug, Serialize, Deserialize)]
struct HeaderData {
    args: CampaignConfig,
}

/// First line of every log, `{"error": null, "data": {"args": <config>}}`.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    error: Option<serde_json::Value>,
    data: HeaderData,
}

/// Line-oriented writer; each line is flushed as soon as it is written so a
/// crashed campaign still leaves a readable prefix.
pub struct OutputLog<W: Write> {
    out: W,
    records: u64,
}

impl<W: Write> OutputLog<W> {
    /// Start a log by writing the header line.
    pub fn create(mut out: W, config: &CampaignConfig) -> Result<Self> {
        let header = Header {
            error: None,
            data: HeaderData {
                args: config.clone(),
            },
        };
        serde_json::to_writer(&mut out, &header).context("serialize log header")?;
        out.write_all(b"\n").context("write log header")?;
        out.flush().context("flush log header")?;
        Ok(Self { out, records: 0 })
    }

    pub fn append(&mut self, record: &OutcomeRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("serialize record")?;
        self.out.write_all(b"\n").context("write record")?;
        self.out.flush().context("flush record")?;
        self.records += 1;
        Ok(())
    }

    pub fn append_all<'a>(&mut self, records: impl IntoIterator<Item = &'a OutcomeRecord>) -> Result<()> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Records written so far, header excluded.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// A log read back from disk.
#[derive(Debug)]
pub struct LoggedCampaign {
    pub config: CampaignConfig,
    pub records: Vec<OutcomeRecord>,
}

/// Read a complete output log.
///
/// The header is required. Record lines that do not parse (or lack
/// `module_path`) are skipped with a warning.
pub fn read_log(path: &Path) -> Result<LoggedCampaign> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let first = lines
        .next()
        .ok_or_else(|| anyhow!("{} is empty", path.display()))?
        .with_context(|| format!("read {}", path.display()))?;
    let header: Header = serde_json::from_str(&first)
        .with_context(|| format!("parse header of {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<OutcomeRecord>(&line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(err = %err, line = index + 2, "skipping unreadable log record"),
        }
    }

    Ok(LoggedCampaign {
        config: header.data.args,
        records,
    })
}

//! Output-file uniqueness and size statistics.
//!
//! The I/O pass (`io::filestats`) measures every module's output directory;
//! this module folds those measurements into the sidecar document.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Generation-types whose per-module measurements are kept in the sidecar.
pub const RAW_GENTYPES: [&str; 3] = ["infilled", "complete", "diffmode"];

/// Measurements of one module's outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFiles {
    pub file_sizes: Vec<u64>,
    /// Number of content-distinct output files.
    pub unique_hashes: usize,
}

/// Summary for one generation-type (or `combined`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStatsEntry {
    pub total_unique: usize,
    /// Modules whose outputs are all identical.
    pub single_unique: usize,
    /// Modules that produced no outputs.
    pub zero_unique: usize,
    pub average_file_size: f64,
    pub average_nonzero_file_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<BTreeMap<String, ModuleFiles>>,
}

/// The `.filestats.json` document: one entry per generation-type plus `combined`.
pub type FileStatsReport = BTreeMap<String, FileStatsEntry>;

struct SizeSum {
    bytes: u64,
    files: u64,
}

impl SizeSum {
    fn average(&self) -> f64 {
        if self.files == 0 {
            0.0
        } else {
            self.bytes as f64 / self.files as f64
        }
    }
}

/// Fold per-module measurements (keyed by generation-type, then module path).
pub fn summarize(modules: &BTreeMap<String, BTreeMap<String, ModuleFiles>>) -> FileStatsReport {
    let mut report = FileStatsReport::new();
    let mut combined = FileStatsEntry::default();
    let mut all = SizeSum { bytes: 0, files: 0 };
    let mut all_nonzero = SizeSum { bytes: 0, files: 0 };

    for (gentype, per_module) in modules {
        let sizes = per_module.values().flat_map(|m| m.file_sizes.iter().copied());
        let mut sum = SizeSum { bytes: 0, files: 0 };
        let mut nonzero = SizeSum { bytes: 0, files: 0 };
        for size in sizes {
            sum.bytes += size;
            sum.files += 1;
            if size > 0 {
                nonzero.bytes += size;
                nonzero.files += 1;
            }
        }

        let entry = FileStatsEntry {
            total_unique: per_module.values().map(|m| m.unique_hashes).sum(),
            single_unique: per_module.values().filter(|m| m.unique_hashes == 1).count(),
            zero_unique: per_module.values().filter(|m| m.unique_hashes == 0).count(),
            average_file_size: sum.average(),
            average_nonzero_file_size: nonzero.average(),
            raw: RAW_GENTYPES
                .contains(&gentype.as_str())
                .then(|| per_module.clone()),
        };

        combined.total_unique += entry.total_unique;
        combined.single_unique += entry.single_unique;
        combined.zero_unique += entry.zero_unique;
        all.bytes += sum.bytes;
        all.files += sum.files;
        all_nonzero.bytes += nonzero.bytes;
        all_nonzero.files += nonzero.files;
        report.insert(gentype.clone(), entry);
    }

    combined.average_file_size = all.average();
    combined.average_nonzero_file_size = all_nonzero.average();
    report.insert("combined".to_string(), combined);
    report
}

/// Text form of the report, `combined` last.
pub fn render(report: &FileStatsReport) -> String {
    let mut out = String::from("File stats:\n");
    let ordered = report
        .iter()
        .filter(|(name, _)| name.as_str() != "combined")
        .chain(report.get_key_value("combined"));
    for (name, entry) in ordered {
        let _ = writeln!(out, "  {name}:");
        let _ = writeln!(out, "    total unique: {}", entry.total_unique);
        let _ = writeln!(out, "    single unique: {}", entry.single_unique);
        let _ = writeln!(out, "    zero unique: {}", entry.zero_unique);
        let _ = writeln!(out, "    average file size: {:.2} bytes", entry.average_file_size);
        let _ = writeln!(
            out,
            "    average nonzero file size: {:.2} bytes",
            entry.average_nonzero_file_size
        );
    }
    out
}

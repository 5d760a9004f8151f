//! The file-statistics pass: hash and size every module's generated outputs
//! and write the `.filestats.json` sidecar next to the log.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::core::filestats::{FileStatsReport, ModuleFiles, summarize};
use crate::core::module::{gentype, module_base};
use crate::core::result::OutcomeRecord;
use crate::io::config::ProgressMode;
use crate::io::progress::Progress;
use crate::io::worker::OUTPUT_SUBDIR;

/// `<log-base>.filestats.json`.
pub fn sidecar_path(log_path: &Path) -> PathBuf {
    log_path.with_extension("filestats.json")
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}

/// Measure the outputs ending in `suffix` directly inside `dir`.
///
/// A directory that was never created counts as "no outputs".
pub fn measure_outputs(dir: &Path, suffix: &str) -> Result<ModuleFiles> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(ModuleFiles::default()),
        Err(err) => return Err(err).with_context(|| format!("list {}", dir.display())),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(suffix));
        if matches && entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut hashes = BTreeSet::new();
    let mut file_sizes = Vec::with_capacity(paths.len());
    for path in &paths {
        let size = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        file_sizes.push(size);
        hashes.insert(file_sha256(path)?);
    }
    Ok(ModuleFiles {
        file_sizes,
        unique_hashes: hashes.len(),
    })
}

/// Compute the report for every module named in `records`.
#[instrument(skip_all, fields(output_dir = %output_dir.display()))]
pub fn collect(
    records: &[OutcomeRecord],
    output_dir: &Path,
    suffix: &str,
    progress: ProgressMode,
) -> Result<FileStatsReport> {
    let modules: BTreeSet<&str> = records.iter().map(|r| r.module_path.as_str()).collect();
    let mut bar = Progress::new(progress, "filestats", modules.len() as u64);
    let mut measured: BTreeMap<String, BTreeMap<String, ModuleFiles>> = BTreeMap::new();
    for module in modules {
        let dir = output_dir
            .join(module_base(Path::new(module)))
            .join(OUTPUT_SUBDIR);
        let files = measure_outputs(&dir, suffix)?;
        debug!(module, files = files.file_sizes.len(), unique = files.unique_hashes, "measured outputs");
        measured
            .entry(gentype(module).to_string())
            .or_default()
            .insert(module.to_string(), files);
        bar.inc();
    }
    bar.finish();
    Ok(summarize(&measured))
}

pub fn write_sidecar(path: &Path, report: &FileStatsReport) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(report).context("serialize file stats")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "wrote file stats");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::ResultKind;

    fn outputs(root: &Path, module: &str, files: &[(&str, &str)]) {
        let dir = root.join(module.trim_end_matches(".py")).join(OUTPUT_SUBDIR);
        fs::create_dir_all(&dir).expect("output dir");
        for (name, contents) in files {
            fs::write(dir.join(name), contents).expect("output");
        }
    }

    #[test]
    fn sidecar_sits_next_to_log() {
        assert_eq!(
            sidecar_path(Path::new("runs/gen3.jsonl")),
            PathBuf::from("runs/gen3.filestats.json")
        );
    }

    #[test]
    fn measures_only_suffixed_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        outputs(
            temp.path(),
            "var_0000.complete.py",
            &[("a.gif", "same"), ("b.gif", "same"), ("c.gif", ""), ("notes.txt", "x")],
        );
        let dir = temp.path().join("var_0000.complete").join(OUTPUT_SUBDIR);
        let files = measure_outputs(&dir, ".gif").expect("measure");
        assert_eq!(files.file_sizes, vec![4, 4, 0]);
        assert_eq!(files.unique_hashes, 2);
    }

    #[test]
    fn missing_output_dir_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = measure_outputs(&temp.path().join("absent"), ".gif").expect("measure");
        assert_eq!(files, ModuleFiles::default());
    }

    #[test]
    fn collect_groups_by_gentype() {
        let temp = tempfile::tempdir().expect("tempdir");
        outputs(temp.path(), "var_0000.complete.py", &[("a.gif", "one"), ("b.gif", "two")]);
        outputs(temp.path(), "var_0001.lmsplice.py", &[("a.gif", "x"), ("b.gif", "x")]);
        let records: Vec<OutcomeRecord> = [
            "mods/var_0000.complete.py",
            "mods/var_0000.complete.py",
            "mods/var_0001.lmsplice.py",
            "mods/var_0002.lmsplice.py",
        ]
        .iter()
        .map(|m| OutcomeRecord::synthetic(ResultKind::Success, m, "generate"))
        .collect();

        let report = collect(&records, temp.path(), ".gif", ProgressMode::Hidden).expect("collect");
        let complete = &report["complete"];
        assert_eq!(complete.total_unique, 2);
        assert!(complete.raw.is_some());
        let lmsplice = &report["lmsplice"];
        assert_eq!(lmsplice.single_unique, 1);
        assert_eq!(lmsplice.zero_unique, 1);
        assert!(lmsplice.raw.is_none());
        assert_eq!(report["combined"].total_unique, 3);

        let sidecar = temp.path().join("run.filestats.json");
        write_sidecar(&sidecar, &report).expect("write");
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&sidecar).expect("read")).expect("json");
        assert_eq!(value["combined"]["zero_unique"], 1);
    }
}

//! Seed-input corpus: enumeration, sampling and per-generation persistence.
//!
//! Persisted state is one file per generation, `<run_dir>/gen<k>/seed_inputs`,
//! holding one seed path per line. Files are written once and never touched
//! again; the next generation reads its predecessor's file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::generation::{Generation, SeedError, SeedSource, plan_seed_source};
use crate::io::config::CampaignConfig;

pub const SEED_LIST_NAME: &str = "seed_inputs";

/// The ordered seed inputs handed to every driver of a generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    paths: Vec<String>,
}

impl SeedSet {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// `;`-joined form passed on the driver's command line.
    pub fn joined(&self) -> String {
        self.paths.join(";")
    }
}

/// Every file under `dir`, recursively, in a stable (sorted) order.
pub fn enumerate_seeds(dir: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            paths.push(entry.path().display().to_string());
        }
    }
    debug!(dir = %dir.display(), count = paths.len(), "enumerated seed inputs");
    Ok(paths)
}

/// Uniform sample of `k` distinct entries, without replacement.
pub fn sample_seeds<R: Rng + ?Sized>(
    population: &[String],
    k: usize,
    rng: &mut R,
) -> Result<Vec<String>, SeedError> {
    if k > population.len() {
        return Err(SeedError::SampleTooLarge {
            requested: k,
            population: population.len(),
        });
    }
    Ok(population.choose_multiple(rng, k).cloned().collect())
}

pub fn seed_list_path(run_dir: &Path, generation: Generation) -> PathBuf {
    run_dir.join(generation.to_string()).join(SEED_LIST_NAME)
}

fn render_seed_list(paths: &[String]) -> String {
    let mut contents = String::new();
    for path in paths {
        contents.push_str(path);
        contents.push('\n');
    }
    contents
}

fn write_seed_list(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn fresh_seeds<R: Rng + ?Sized>(config: &CampaignConfig, rng: &mut R) -> Result<Vec<String>> {
    let dir = config
        .seeds
        .input_dir
        .as_deref()
        .ok_or(SeedError::MissingSourceDir)?;
    let population = enumerate_seeds(dir)?;
    match config.seeds.samples {
        Some(k) => Ok(sample_seeds(&population, k, rng)?),
        None => Ok(population),
    }
}

/// Resolve the seed set for the configured generation, persisting it when
/// resampling is enabled.
pub fn resolve_seeds<R: Rng + ?Sized>(config: &CampaignConfig, rng: &mut R) -> Result<SeedSet> {
    let generation: Generation = config.generation.parse()?;
    let source = plan_seed_source(
        generation,
        config.seeds.resample_every(),
        config.seeds.samples.is_some(),
    )?;
    let target = seed_list_path(&config.run_dir, generation);

    let paths = match source {
        SeedSource::Fixed => return Ok(SeedSet::new(fresh_seeds(config, rng)?)),
        SeedSource::Resample => {
            info!(%generation, "resample seed inputs");
            let paths = fresh_seeds(config, rng)?;
            write_seed_list(&target, render_seed_list(&paths).as_bytes())?;
            paths
        }
        SeedSource::Inherit(previous) => {
            info!(%generation, %previous, "inherit seed inputs");
            let source_path = seed_list_path(&config.run_dir, previous);
            if !source_path.exists() {
                return Err(SeedError::MissingPreviousList(source_path.display().to_string()).into());
            }
            let bytes = fs::read(&source_path)
                .with_context(|| format!("read {}", source_path.display()))?;
            write_seed_list(&target, &bytes)?;
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    };
    debug!(path = %target.display(), count = paths.len(), "seed list persisted");
    Ok(SeedSet::new(paths))
}

//! Seed-corpus transition rule across generations.
//!
//! Each invocation handles one generation `gen<k>`. Whether its seed list is
//! drawn fresh from the source directory or inherited from `gen<k-1>` depends
//! only on `k` and the resample period.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while resolving a generation's seed inputs.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("generation name {0:?} must look like gen<k>")]
    BadGenerationName(String),
    #[error("cannot sample {requested} seed inputs from a population of {population}")]
    SampleTooLarge { requested: usize, population: usize },
    #[error("no seed input directory configured")]
    MissingSourceDir,
    #[error(
        "seed down-sampling without resampling is only possible for gen0 (got {0}); \
         enable resampling so the sample is persisted"
    )]
    SampleWithoutResample(Generation),
    #[error("previous generation seed list {0} is missing")]
    MissingPreviousList(String),
}

/// Index of a generation, parsed from and displayed as `gen<k>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(pub u32);

impl Generation {
    pub fn previous(self) -> Option<Generation> {
        self.0.checked_sub(1).map(Generation)
    }
}

impl FromStr for Generation {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("gen")
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok())
            .map(Generation)
            .ok_or_else(|| SeedError::BadGenerationName(s.to_string()))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Where a generation's seed list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Resampling disabled: enumerate the source directory, nothing persisted.
    Fixed,
    /// Enumerate (and optionally sample) afresh, then persist.
    Resample,
    /// Copy the given generation's persisted list, then persist it again.
    Inherit(Generation),
}

/// Decide the seed source for `generation` given the resample period.
///
/// `sampling` reports whether a down-sample size is configured; with
/// resampling disabled a sample could not be reproduced by later generations,
/// so it is only accepted for `gen0`.
pub fn plan_seed_source(
    generation: Generation,
    resample_every: Option<NonZeroU32>,
    sampling: bool,
) -> Result<SeedSource, SeedError> {
    let Some(period) = resample_every else {
        if sampling && generation.0 != 0 {
            return Err(SeedError::SampleWithoutResample(generation));
        }
        return Ok(SeedSource::Fixed);
    };
    match generation.previous() {
        Some(previous) if generation.0 % period.get() != 0 => Ok(SeedSource::Inherit(previous)),
        _ => Ok(SeedSource::Resample),
    }
}

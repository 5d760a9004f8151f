//! Per-kind outcome counts, grouped by generation-type.
//!
//! Counts are always derived from the output log; nothing here is persisted.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::module::gentype;
use crate::core::result::{OutcomeRecord, ResultKind};

/// Counts per result kind. Absent kinds read as zero; iteration is by kind name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindCounts {
    counts: BTreeMap<ResultKind, u64>,
}

impl KindCounts {
    pub fn get(&self, kind: &ResultKind) -> u64 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn add(&mut self, kind: ResultKind, n: u64) {
        *self.counts.entry(kind).or_insert(0) += n;
    }

    pub fn merge(&mut self, other: &KindCounts) {
        for (kind, n) in other.iter() {
            self.add(kind.clone(), n);
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResultKind, u64)> {
        self.counts.iter().map(|(kind, n)| (kind, *n))
    }
}

impl<const N: usize> From<[(ResultKind, u64); N]> for KindCounts {
    fn from(entries: [(ResultKind, u64); N]) -> Self {
        let mut counts = KindCounts::default();
        for (kind, n) in entries {
            counts.add(kind, n);
        }
        counts
    }
}

impl fmt::Display for KindCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (kind, n)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {n}")?;
        }
        f.write_str("}")
    }
}

/// Campaign-wide counts keyed by generation-type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignStats {
    by_gentype: BTreeMap<String, KindCounts>,
}

impl CampaignStats {
    /// Accumulate records; an `ImportError` stands for `iterations` failures.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a OutcomeRecord>,
        iterations: u64,
    ) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.record(record, iterations);
        }
        stats
    }

    pub fn record(&mut self, record: &OutcomeRecord, iterations: u64) {
        let weight = if record.is_import_error() { iterations } else { 1 };
        self.by_gentype
            .entry(gentype(&record.module_path).to_string())
            .or_default()
            .add(record.result_type.clone(), weight);
    }

    /// Counts for one generation-type; unseen types are empty.
    pub fn gentype(&self, name: &str) -> KindCounts {
        self.by_gentype.get(name).cloned().unwrap_or_default()
    }

    /// Generation-types in name order.
    pub fn gentypes(&self) -> impl Iterator<Item = (&str, &KindCounts)> {
        self.by_gentype.iter().map(|(name, counts)| (name.as_str(), counts))
    }

    pub fn combined(&self) -> KindCounts {
        let mut combined = KindCounts::default();
        for counts in self.by_gentype.values() {
            combined.merge(counts);
        }
        combined
    }
}

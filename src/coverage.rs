//! Genome coverage, i.e., which regions are considered well-genotyped.

use std::{path::Path, time::Instant};

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;
use indexmap::IndexMap;
use thousands::Separable;

use crate::common::{canonicalize, io::open_read_maybe_gz};

/// Alias for the interval tree that we use.
type IntervalTree = ArrayBackedIntervalTree<u64, ()>;

/// Answer whether a locus lies in well-genotyped regions.
pub trait Coverage {
    /// Whether the half-open interval `[pos, pos + len)` with 1-based `pos`
    /// is fully contained in one covered region on `contig`.
    fn covers(&self, contig: &str, pos: usize, len: usize) -> bool;
}

/// Coverage used when no regions are given; everything is covered.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllCovered;

impl Coverage for AllCovered {
    fn covers(&self, _contig: &str, _pos: usize, _len: usize) -> bool {
        true
    }
}

/// Module with code supporting the parsing.
mod input {
    use serde::Deserialize;

    /// Leading columns of a BED record.
    #[derive(Debug, Deserialize)]
    pub struct Record {
        /// Chromosome name
        pub chromosome: String,
        /// 0-based begin position
        pub begin: u64,
        /// 0-based end position (exclusive)
        pub end: u64,
    }
}

/// Covered regions, e.g., loaded from a BED file.
#[derive(Default, Debug)]
pub struct CoverageRegions {
    /// Interval trees with merged regions, by canonical contig name.
    trees: IndexMap<String, IntervalTree>,
}

impl CoverageRegions {
    /// Build from 0-based, half-open `(contig, begin, end)` intervals.
    ///
    /// Overlapping and abutting intervals on the same contig are merged.
    pub fn from_intervals<I, S>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (S, u64, u64)>,
        S: AsRef<str>,
    {
        let mut by_contig: IndexMap<String, Vec<(u64, u64)>> = IndexMap::new();
        for (contig, begin, end) in intervals {
            if begin < end {
                by_contig
                    .entry(canonicalize(contig.as_ref()))
                    .or_default()
                    .push((begin, end));
            }
        }

        let trees = by_contig
            .into_iter()
            .map(|(contig, intervals)| {
                let mut tree = IntervalTree::new();
                for (begin, end) in merge_intervals(intervals) {
                    tree.insert(begin..end, ());
                }
                tree.index();
                (contig, tree)
            })
            .collect();

        Self { trees }
    }

    /// Load regions from a BED file; the file may be gzip compressed.
    #[tracing::instrument]
    pub fn from_bed(path: &Path) -> Result<Self, anyhow::Error> {
        tracing::debug!("loading coverage regions from {:?}", path);
        let before_loading = Instant::now();

        // Setup CSV reader for BED file, `track` and `browser` lines are
        // skipped below and headers written as comment are ignored.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(
                open_read_maybe_gz(path)
                    .map_err(|e| anyhow::anyhow!("could not open BED file {:?}: {}", path, e))?,
            );

        let mut intervals = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| anyhow::anyhow!("problem reading BED file {:?}: {}", path, e))?;
            if record
                .get(0)
                .map(|s| s.starts_with("track") || s.starts_with("browser"))
                .unwrap_or(false)
            {
                continue;
            }
            let record: input::Record = record.deserialize(None).map_err(|e| {
                anyhow::anyhow!("invalid BED record {:?} in {:?}: {}", &record, path, e)
            })?;
            if record.begin > record.end {
                anyhow::bail!("invalid BED record {:?} in {:?}", &record, path);
            }
            intervals.push((record.chromosome, record.begin, record.end));
        }
        let count = intervals.len();
        let result = Self::from_intervals(intervals);

        tracing::debug!(
            "loaded {} regions on {} contigs from {:?} in {:?}",
            count.separate_with_commas(),
            result.trees.len(),
            path,
            before_loading.elapsed()
        );

        Ok(result)
    }
}

impl Coverage for CoverageRegions {
    fn covers(&self, contig: &str, pos: usize, len: usize) -> bool {
        let Some(tree) = self.trees.get(&canonicalize(contig)) else {
            return false;
        };
        let begin = pos.saturating_sub(1) as u64;
        let end = begin + len.max(1) as u64;

        tree.find(begin..end)
            .iter()
            .any(|entry| entry.interval().start <= begin && entry.interval().end >= end)
    }
}

/// Merge overlapping and abutting half-open intervals.
fn merge_intervals(mut intervals: Vec<(u64, u64)>) -> Vec<(u64, u64)> {
    intervals.sort_unstable();
    let mut result: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
    for (begin, end) in intervals {
        match result.last_mut() {
            Some(last) if begin <= last.1 => last.1 = last.1.max(end),
            _ => result.push((begin, end)),
        }
    }
    result
}

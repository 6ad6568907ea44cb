//! Accumulation of per-locus dosages into per-sample scores.

use indexmap::IndexMap;
use strum::IntoEnumIterator;

use crate::{coverage::Coverage, err::ScoringError, genotypes::GenotypeStore, scoredef::ScoreEntry};

use super::resolve::{resolve_locus, Outcome, ResolveParams, ResolvedLocus, WarningSink};

/// Final scores of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    /// One score per sample in store order, `None` if missing.
    pub values: Vec<Option<f64>>,
    /// Number of scored loci.
    pub loci: usize,
    /// Number of loci per resolution outcome.
    pub outcomes: IndexMap<Outcome, usize>,
}

/// Compute the scores of all samples in `store`.
///
/// Each score is `offset + sum(dosage * beta) / loci`.  `on_locus` is called
/// with every resolved locus, e.g., for writing a report.
pub fn compute_scores<I, S, C, W, F>(
    offset: f64,
    entries: I,
    store: &mut S,
    coverage: &C,
    params: &ResolveParams,
    sink: &mut W,
    mut on_locus: F,
) -> Result<Scores, anyhow::Error>
where
    I: IntoIterator<Item = Result<ScoreEntry, anyhow::Error>>,
    S: GenotypeStore + ?Sized,
    C: Coverage + ?Sized,
    W: WarningSink + ?Sized,
    F: FnMut(&ScoreEntry, &ResolvedLocus) -> Result<(), anyhow::Error>,
{
    let mut sums: Vec<Option<f64>> = vec![Some(0.0); store.sample_count()];
    let mut loci = 0usize;
    let mut outcomes = Outcome::iter()
        .map(|outcome| (outcome, 0usize))
        .collect::<IndexMap<_, _>>();

    for entry in entries {
        let entry = entry?;
        let resolved = resolve_locus(&entry, store, coverage, params, sink)?;
        for (sum, dosage) in sums.iter_mut().zip(resolved.dosages.iter()) {
            *sum = sum.zip(*dosage).map(|(sum, dosage)| sum + dosage * entry.beta);
        }
        loci += 1;
        *outcomes.entry(resolved.outcome).or_default() += 1;
        on_locus(&entry, &resolved)?;

        if loci % 10_000 == 0 {
            tracing::debug!("processed {} loci, last: {}", loci, &entry);
        }
    }

    if loci == 0 {
        return Err(ScoringError::NoLoci.into());
    }

    let values = sums
        .into_iter()
        .map(|sum| sum.map(|sum| offset + sum / loci as f64))
        .collect();

    Ok(Scores {
        values,
        loci,
        outcomes,
    })
}

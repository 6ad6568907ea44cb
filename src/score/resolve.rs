//! Resolution of one scored locus into a dosage vector.

use crate::{
    coverage::Coverage,
    err::ScoringError,
    genotypes::{Dosage, FilterStatus, GenotypeStore},
    scoredef::ScoreEntry,
    stats::binom_test_two_sided,
};

use super::{
    impute::{impute_locus, impute_samples, LocusImputation, SampleImputation},
    tally::AlleleTally,
};

/// Parameters of the dosage resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveParams {
    /// Method for rejected loci.
    pub locus_imputation: LocusImputation,
    /// Method for samples without genotype.
    pub sample_imputation: SampleImputation,
    /// Loci with a larger fraction of missing genotypes are rejected.
    pub max_missing_rate: f64,
    /// Minimal number of genotyped samples for cohort-internal imputation.
    pub min_internal_samples: usize,
    /// Warn about allele frequency mismatches below this p-value.
    pub af_mismatch_pvalue: f64,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            locus_imputation: LocusImputation::Ps,
            sample_imputation: SampleImputation::IntPs,
            max_missing_rate: 0.05,
            min_internal_samples: 100,
            af_mismatch_pvalue: 0.001,
        }
    }
}

/// Recoverable problems with a locus.
#[derive(Debug, Clone, PartialEq)]
pub enum LocusWarning {
    /// The locus is not in the covered regions.
    NotCovered,
    /// No matching variant in the genotype store.
    Absent { pvalue: f64 },
    /// The variant failed quality filters.
    FilterFailed { filters: Vec<String> },
    /// Too many samples have no genotype.
    HighMissingness { rate: f64, max: f64 },
    /// Cohort and population allele frequency do not agree.
    AlleleFrequencyMismatch {
        observed: f64,
        expected: f64,
        pvalue: f64,
    },
}

impl std::fmt::Display for LocusWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocusWarning::NotCovered => write!(f, "locus not in covered regions"),
            LocusWarning::Absent { pvalue } => write!(
                f,
                "variant absent from cohort, unlikely given population frequency (p={:e})",
                pvalue
            ),
            LocusWarning::FilterFailed { filters } => {
                write!(f, "variant failed filters {}", filters.join(";"))
            }
            LocusWarning::HighMissingness { rate, max } => write!(
                f,
                "missing genotype rate {:.4} exceeds maximum {}",
                rate, max
            ),
            LocusWarning::AlleleFrequencyMismatch {
                observed,
                expected,
                pvalue,
            } => write!(
                f,
                "cohort allele frequency {:.4} differs from population frequency {} (p={:e})",
                observed, expected, pvalue
            ),
        }
    }
}

/// Receiver of per-locus warnings.
pub trait WarningSink {
    /// Record `warning` for `entry`.
    fn warn(&mut self, entry: &ScoreEntry, warning: LocusWarning);
}

/// Sink that emits warnings as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn warn(&mut self, entry: &ScoreEntry, warning: LocusWarning) {
        tracing::warn!(locus = %entry, "{}", &warning);
    }
}

/// Collects warnings together with the locus they refer to.
impl WarningSink for Vec<(String, LocusWarning)> {
    fn warn(&mut self, entry: &ScoreEntry, warning: LocusWarning) {
        self.push((entry.to_string(), warning));
    }
}

/// How a locus was resolved.
#[derive(
    serde::Serialize,
    strum::Display,
    strum::EnumIter,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    NotCovered,
    Absent,
    FilterFailed,
    HighMissingness,
    Genotyped,
}

/// Result of resolving one locus.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocus {
    /// One dosage per sample, after imputation.
    pub dosages: Vec<Dosage>,
    /// How the locus was resolved.
    pub outcome: Outcome,
    /// Tally of the raw dosages, if fetched.
    pub tally: Option<AlleleTally>,
    /// P-value of the allele frequency consistency check, if performed.
    pub pvalue: Option<f64>,
}

impl ResolvedLocus {
    fn new(dosages: Vec<Dosage>, outcome: Outcome) -> Self {
        Self {
            dosages,
            outcome,
            tally: None,
            pvalue: None,
        }
    }
}

/// Resolve the dosages of all samples for `entry`.
///
/// Only failures of the genotype store are errors, all other problems are
/// reported to `sink` and handled by imputation.
pub fn resolve_locus<S, C, W>(
    entry: &ScoreEntry,
    store: &mut S,
    coverage: &C,
    params: &ResolveParams,
    sink: &mut W,
) -> Result<ResolvedLocus, anyhow::Error>
where
    S: GenotypeStore + ?Sized,
    C: Coverage + ?Sized,
    W: WarningSink + ?Sized,
{
    let sample_count = store.sample_count();
    let trials = 2 * sample_count as u64;
    let mut dosages: Vec<Dosage> = vec![None; sample_count];

    if !coverage.covers(&entry.contig, entry.pos, entry.reference.len()) {
        sink.warn(entry, LocusWarning::NotCovered);
        impute_locus(&mut dosages, entry, params.locus_imputation);
        return Ok(ResolvedLocus::new(dosages, Outcome::NotCovered));
    }

    let variants = store
        .fetch(&entry.contig, entry.pos, entry.end())
        .map_err(|e| anyhow::anyhow!("problem fetching variants for {}: {}", entry, e))?;
    let Some(variant) = variants
        .iter()
        .find(|v| v.matches(entry.pos, &entry.reference, &entry.alternative))
    else {
        let pvalue = binom_test_two_sided(0.0, trials, entry.aaf);
        if pvalue < params.af_mismatch_pvalue {
            sink.warn(entry, LocusWarning::Absent { pvalue });
        } else {
            tracing::debug!("{}: variant absent from cohort", entry);
        }
        dosages.iter_mut().for_each(|dosage| *dosage = Some(0.0));
        return Ok(ResolvedLocus {
            pvalue: Some(pvalue),
            ..ResolvedLocus::new(dosages, Outcome::Absent)
        });
    };

    if let FilterStatus::Fail(filters) = &variant.filter {
        sink.warn(
            entry,
            LocusWarning::FilterFailed {
                filters: filters.clone(),
            },
        );
        impute_locus(&mut dosages, entry, params.locus_imputation);
        return Ok(ResolvedLocus::new(dosages, Outcome::FilterFailed));
    }

    let allele = variant
        .allele_index(&entry.alternative)
        .ok_or_else(|| anyhow::anyhow!("allele {} vanished from {}", entry.alternative, entry))?;
    let raw = variant.dosages(allele);
    if raw.len() != sample_count {
        return Err(ScoringError::SampleCountMismatch {
            locus: entry.to_string(),
            expected: sample_count,
            found: raw.len(),
        }
        .into());
    }
    dosages = raw;
    let tally = AlleleTally::from_dosages(&dosages);

    let rate = tally.missing_rate();
    if rate > params.max_missing_rate {
        sink.warn(
            entry,
            LocusWarning::HighMissingness {
                rate,
                max: params.max_missing_rate,
            },
        );
        impute_locus(&mut dosages, entry, params.locus_imputation);
        return Ok(ResolvedLocus {
            tally: Some(tally),
            ..ResolvedLocus::new(dosages, Outcome::HighMissingness)
        });
    }

    let pvalue = binom_test_two_sided(tally.effect_total, trials, entry.aaf);
    if pvalue < params.af_mismatch_pvalue {
        sink.warn(
            entry,
            LocusWarning::AlleleFrequencyMismatch {
                observed: tally.observed_aaf().unwrap_or(f64::NAN),
                expected: entry.aaf,
                pvalue,
            },
        );
    }

    impute_samples(
        &mut dosages,
        entry,
        &tally,
        params.min_internal_samples,
        params.sample_imputation,
    );
    tracing::trace!(
        "{}: {} genotyped, {} missing, p={}",
        entry,
        tally.genotyped,
        tally.missing,
        pvalue
    );

    Ok(ResolvedLocus {
        dosages,
        outcome: Outcome::Genotyped,
        tally: Some(tally),
        pvalue: Some(pvalue),
    })
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{resolve_locus, LocusWarning, Outcome, ResolveParams, TracingWarnings};
    use crate::{
        coverage::{AllCovered, CoverageRegions},
        genotypes::{FilterStatus, MemoryStore},
        score::impute::{LocusImputation, SampleImputation},
        scoredef::ScoreEntry,
    };

    fn entry(aaf: f64) -> ScoreEntry {
        ScoreEntry {
            contig: String::from("1"),
            pos: 100,
            reference: String::from("A"),
            alternative: String::from("G"),
            beta: 1.0,
            aaf,
        }
    }

    fn params(locus: LocusImputation, sample: SampleImputation, max_missing: f64) -> ResolveParams {
        ResolveParams {
            locus_imputation: locus,
            sample_imputation: sample,
            max_missing_rate: max_missing,
            ..Default::default()
        }
    }

    #[test]
    fn default_params() {
        let params = ResolveParams::default();

        assert_eq!(params.locus_imputation, LocusImputation::Ps);
        assert_eq!(params.sample_imputation, SampleImputation::IntPs);
        assert_eq!(params.max_missing_rate, 0.05);
        assert_eq!(params.min_internal_samples, 100);
        assert_eq!(params.af_mismatch_pvalue, 0.001);
    }

    #[test]
    fn not_covered() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(3).add("1", 100, "A", "G", &["1/1", "1/1", "1/1"]);
        let coverage = CoverageRegions::from_intervals([("1", 500, 600)]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.25),
            &mut store,
            &coverage,
            &ResolveParams::default(),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::NotCovered);
        assert_eq!(resolved.dosages, vec![Some(0.5); 3]);
        assert_eq!(resolved.tally, None);
        assert_eq!(
            warnings,
            vec![(String::from("1:100:A:G"), LocusWarning::NotCovered)]
        );

        Ok(())
    }

    #[test]
    fn absent_sets_zero() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(3).add("1", 100, "A", "T", &["1/1", "1/1", "1/1"]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.5),
            &mut store,
            &AllCovered,
            &params(LocusImputation::Ps, SampleImputation::Ps, 0.05),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::Absent);
        assert_eq!(resolved.dosages, vec![Some(0.0); 3]);
        // P(X = 0 | n = 6, p = 0.5) * 2
        assert!(approx_eq!(
            f64,
            resolved.pvalue.expect("p-value must be set"),
            0.03125,
            epsilon = 1e-9
        ));
        assert!(warnings.is_empty());

        Ok(())
    }

    #[test]
    fn absent_common_variant_warns() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(20);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.5),
            &mut store,
            &AllCovered,
            &ResolveParams::default(),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::Absent);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, "1:100:A:G");
        assert!(matches!(warnings[0].1, LocusWarning::Absent { .. }));

        Ok(())
    }

    #[rstest]
    #[case(LocusImputation::Ps, Some(0.5))]
    #[case(LocusImputation::Homref, Some(0.0))]
    #[case(LocusImputation::Fail, None)]
    fn filter_failed(
        #[case] method: LocusImputation,
        #[case] expected: Option<f64>,
    ) -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(2)
            .add("chr1", 100, "A", "G", &["0/1", "1/1"])
            .with_filter(FilterStatus::Fail(vec![String::from("LowQual")]));
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.25),
            &mut store,
            &AllCovered,
            &params(method, SampleImputation::Ps, 0.05),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::FilterFailed);
        assert_eq!(resolved.dosages, vec![expected; 2]);
        assert_eq!(
            warnings,
            vec![(
                String::from("1:100:A:G"),
                LocusWarning::FilterFailed {
                    filters: vec![String::from("LowQual")]
                }
            )]
        );

        Ok(())
    }

    #[test]
    fn sample_imputation_below_missing_threshold() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(3).add("1", 100, "A", "G", &["0/1", "./.", "1/1"]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.5),
            &mut store,
            &AllCovered,
            &params(LocusImputation::Ps, SampleImputation::Homref, 0.5),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::Genotyped);
        assert_eq!(resolved.dosages, vec![Some(1.0), Some(0.0), Some(2.0)]);
        let tally = resolved.tally.expect("tally must be set");
        assert_eq!((tally.genotyped, tally.missing), (2, 1));
        assert!(warnings.is_empty());

        Ok(())
    }

    #[test]
    fn high_missingness() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(5).add(
            "1",
            100,
            "A",
            "G",
            &["1/1", "./.", "./1", ".", "0/1"],
        );
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.5),
            &mut store,
            &AllCovered,
            &params(LocusImputation::Homref, SampleImputation::Ps, 0.05),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::HighMissingness);
        assert_eq!(resolved.dosages, vec![Some(0.0); 5]);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0].1,
            LocusWarning::HighMissingness { rate, max } if rate == 0.6 && max == 0.05
        ));

        Ok(())
    }

    #[rstest]
    // one of five samples missing is a rate of exactly 0.2
    #[case(0.2, Outcome::Genotyped)]
    #[case(0.25, Outcome::Genotyped)]
    #[case(0.19, Outcome::HighMissingness)]
    fn missing_rate_must_exceed_maximum(
        #[case] max_missing: f64,
        #[case] expected: Outcome,
    ) -> Result<(), anyhow::Error> {
        let mut store =
            MemoryStore::with_samples(5).add("1", 100, "A", "G", &["0/1", "./.", "0/1", "0/0", "0/0"]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.2),
            &mut store,
            &AllCovered,
            &params(LocusImputation::Homref, SampleImputation::Ps, max_missing),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, expected);
        assert_eq!(
            warnings
                .iter()
                .any(|(_, w)| matches!(w, LocusWarning::HighMissingness { .. })),
            expected == Outcome::HighMissingness
        );

        Ok(())
    }

    #[test]
    fn allele_frequency_mismatch_continues() -> Result<(), anyhow::Error> {
        let gts = ["1/1"; 10];
        let mut store = MemoryStore::with_samples(10).add("1", 100, "A", "G", &gts);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.01),
            &mut store,
            &AllCovered,
            &ResolveParams::default(),
            &mut warnings,
        )?;

        assert_eq!(resolved.outcome, Outcome::Genotyped);
        assert_eq!(resolved.dosages, vec![Some(2.0); 10]);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0].1,
            LocusWarning::AlleleFrequencyMismatch { observed, .. } if observed == 1.0
        ));

        Ok(())
    }

    #[test]
    fn picks_matching_alternative() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(2)
            .add("1", 100, "A", "T", &["1/1", "1/1"])
            .add("1", 100, "A", "G", &["0/1", "0/0"]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let resolved = resolve_locus(
            &entry(0.25),
            &mut store,
            &AllCovered,
            &ResolveParams::default(),
            &mut warnings,
        )?;

        assert_eq!(resolved.dosages, vec![Some(1.0), Some(0.0)]);

        Ok(())
    }

    #[test]
    fn sample_count_mismatch() {
        let mut store = MemoryStore::with_samples(3).add("1", 100, "A", "G", &["0/1", "0/0"]);
        let mut warnings: Vec<(String, LocusWarning)> = Vec::new();

        let res = resolve_locus(
            &entry(0.25),
            &mut store,
            &AllCovered,
            &ResolveParams::default(),
            &mut warnings,
        );

        assert!(res.is_err());
    }

    #[tracing_test::traced_test]
    #[test]
    fn tracing_sink_logs_warnings() -> Result<(), anyhow::Error> {
        let mut store = MemoryStore::with_samples(2)
            .add("1", 100, "A", "G", &["0/1", "0/1"])
            .with_filter(FilterStatus::Fail(vec![String::from("q10")]));

        resolve_locus(
            &entry(0.5),
            &mut store,
            &AllCovered,
            &ResolveParams::default(),
            &mut TracingWarnings,
        )?;

        assert!(logs_contain("variant failed filters q10"));
        assert!(logs_contain("1:100:A:G"));

        Ok(())
    }

    #[test]
    fn warning_messages() {
        assert_eq!(
            LocusWarning::NotCovered.to_string(),
            "locus not in covered regions"
        );
        assert_eq!(
            LocusWarning::HighMissingness {
                rate: 0.6,
                max: 0.05
            }
            .to_string(),
            "missing genotype rate 0.6000 exceeds maximum 0.05"
        );
        assert_eq!(
            LocusWarning::FilterFailed {
                filters: vec![String::from("a"), String::from("b")]
            }
            .to_string(),
            "variant failed filters a;b"
        );
    }

    #[test]
    fn outcome_names() {
        assert_eq!(Outcome::NotCovered.to_string(), "not_covered");
        assert_eq!(Outcome::HighMissingness.to_string(), "high_missingness");
    }
}

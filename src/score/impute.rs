//! Imputation of missing dosages, for whole loci and for single samples.

use crate::{genotypes::Dosage, scoredef::ScoreEntry};

use super::tally::AlleleTally;

/// Imputation method when a whole locus is rejected.
#[derive(
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocusImputation {
    /// Twice the population allele frequency.
    #[default]
    Ps,
    /// Homozygous reference, i.e., zero.
    Homref,
    /// Missing; the affected scores become missing.
    Fail,
}

/// Imputation method for single samples without genotype.
#[derive(
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SampleImputation {
    /// Twice the population allele frequency.
    Ps,
    /// Homozygous reference, i.e., zero.
    Homref,
    /// Missing; the affected scores become missing.
    Fail,
    /// Cohort allele rate if enough samples are genotyped, else `ps`.
    #[default]
    #[value(name = "int_ps")]
    IntPs,
    /// Cohort allele rate if enough samples are genotyped, else `fail`.
    #[value(name = "int_fail")]
    IntFail,
}

impl LocusImputation {
    /// The value written into every sample of a rejected locus.
    pub fn value(self, entry: &ScoreEntry) -> Dosage {
        match self {
            LocusImputation::Ps => Some(2.0 * entry.aaf),
            LocusImputation::Homref => Some(0.0),
            LocusImputation::Fail => None,
        }
    }
}

impl SampleImputation {
    /// The value written into samples without genotype.
    ///
    /// The internal methods use `effect_total / (2 * genotyped)` if at least
    /// `min_internal` samples are genotyped.
    pub fn value(self, entry: &ScoreEntry, tally: &AlleleTally, min_internal: usize) -> Dosage {
        let internal = || {
            (tally.genotyped > 0 && tally.genotyped >= min_internal)
                .then(|| tally.effect_total / (2.0 * tally.genotyped as f64))
        };
        match self {
            SampleImputation::Ps => LocusImputation::Ps.value(entry),
            SampleImputation::Homref => LocusImputation::Homref.value(entry),
            SampleImputation::Fail => LocusImputation::Fail.value(entry),
            SampleImputation::IntPs => internal().or_else(|| LocusImputation::Ps.value(entry)),
            SampleImputation::IntFail => internal(),
        }
    }
}

/// Overwrite all dosages with the value of `method`.
pub fn impute_locus(dosages: &mut [Dosage], entry: &ScoreEntry, method: LocusImputation) {
    let value = method.value(entry);
    dosages.iter_mut().for_each(|dosage| *dosage = value);
}

/// Fill the missing dosages with the value of `method`, keep the others.
pub fn impute_samples(
    dosages: &mut [Dosage],
    entry: &ScoreEntry,
    tally: &AlleleTally,
    min_internal: usize,
    method: SampleImputation,
) {
    let value = method.value(entry, tally, min_internal);
    dosages
        .iter_mut()
        .filter(|dosage| dosage.is_none())
        .for_each(|dosage| *dosage = value);
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{impute_locus, impute_samples, LocusImputation, SampleImputation};
    use crate::{score::tally::AlleleTally, scoredef::ScoreEntry};

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

    #[rstest]
    #[case(LocusImputation::Ps, Some(0.5))]
    #[case(LocusImputation::Homref, Some(0.0))]
    #[case(LocusImputation::Fail, None)]
    fn impute_locus_overwrites(#[case] method: LocusImputation, #[case] expected: Option<f64>) {
        let mut dosages = vec![Some(2.0), None, Some(1.0), Some(0.0)];

        impute_locus(&mut dosages, &entry(0.25), method);

        assert_eq!(dosages, vec![expected; 4]);
    }

    #[rstest]
    // 3 genotyped with 3 effect alleles, threshold reached
    #[case(SampleImputation::Ps, 3, Some(0.5))]
    #[case(SampleImputation::Homref, 3, Some(0.0))]
    #[case(SampleImputation::Fail, 3, None)]
    #[case(SampleImputation::IntPs, 3, Some(0.5))]
    #[case(SampleImputation::IntFail, 3, Some(0.5))]
    // threshold not reached, fall back
    #[case(SampleImputation::IntPs, 4, Some(0.5))]
    #[case(SampleImputation::IntFail, 4, None)]
    fn impute_samples_fills_gaps(
        #[case] method: SampleImputation,
        #[case] min_internal: usize,
        #[case] expected: Option<f64>,
    ) {
        let mut dosages = vec![Some(1.0), None, Some(2.0), Some(0.0), None];
        let tally = AlleleTally::from_dosages(&dosages);

        impute_samples(&mut dosages, &entry(0.25), &tally, min_internal, method);

        assert_eq!(
            dosages,
            vec![Some(1.0), expected, Some(2.0), Some(0.0), expected]
        );
    }

    #[test]
    fn internal_value_differs_from_population() {
        let dosages = vec![Some(2.0), Some(2.0), Some(1.0), Some(1.0), None];
        let tally = AlleleTally::from_dosages(&dosages);
        let entry = entry(0.1);

        assert_eq!(
            SampleImputation::IntPs.value(&entry, &tally, 4),
            Some(0.75)
        );
        assert_eq!(SampleImputation::IntPs.value(&entry, &tally, 5), Some(0.2));
        assert_eq!(SampleImputation::IntFail.value(&entry, &tally, 5), None);
    }

    #[test]
    fn internal_requires_genotyped_samples() {
        let tally = AlleleTally::from_dosages(&[None, None]);

        assert_eq!(
            SampleImputation::IntPs.value(&entry(0.3), &tally, 0),
            LocusImputation::Ps.value(&entry(0.3))
        );
        assert_eq!(SampleImputation::IntFail.value(&entry(0.3), &tally, 0), None);
    }

    #[rstest]
    #[case("ps", SampleImputation::Ps)]
    #[case("homref", SampleImputation::Homref)]
    #[case("fail", SampleImputation::Fail)]
    #[case("int_ps", SampleImputation::IntPs)]
    #[case("int_fail", SampleImputation::IntFail)]
    fn sample_imputation_names(#[case] name: &str, #[case] method: SampleImputation) {
        assert_eq!(name.parse::<SampleImputation>().ok(), Some(method));
        assert_eq!(method.to_string(), name);
        assert_eq!(
            <SampleImputation as clap::ValueEnum>::from_str(name, false).ok(),
            Some(method)
        );
    }

    #[test]
    fn defaults() {
        assert_eq!(LocusImputation::default(), LocusImputation::Ps);
        assert_eq!(SampleImputation::default(), SampleImputation::IntPs);
    }
}

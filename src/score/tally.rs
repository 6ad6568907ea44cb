//! Counting of genotyped samples and effect alleles.

use crate::genotypes::Dosage;

/// Summary of one locus' raw dosages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlleleTally {
    /// Number of samples with a genotype.
    pub genotyped: usize,
    /// Number of samples without a genotype.
    pub missing: usize,
    /// Sum of effect allele copies over the genotyped samples.
    pub effect_total: f64,
}

impl AlleleTally {
    /// Tally the given dosages.
    pub fn from_dosages(dosages: &[Dosage]) -> Self {
        dosages
            .iter()
            .fold(Self::default(), |mut tally, dosage| {
                match dosage {
                    Some(value) => {
                        tally.genotyped += 1;
                        tally.effect_total += value;
                    }
                    None => tally.missing += 1,
                }
                tally
            })
    }

    /// Fraction of samples without a genotype; 0 for an empty cohort.
    pub fn missing_rate(&self) -> f64 {
        let total = self.genotyped + self.missing;
        if total == 0 {
            0.0
        } else {
            self.missing as f64 / total as f64
        }
    }

    /// Observed effect allele frequency among the genotyped samples.
    pub fn observed_aaf(&self) -> Option<f64> {
        if self.genotyped == 0 {
            None
        } else {
            Some(self.effect_total / (2.0 * self.genotyped as f64))
        }
    }
}

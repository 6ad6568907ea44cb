//! Access to the genotypes of the cohort.

pub mod vcf;

/// Allele calls of one sample, `None` for unresolved calls (`.`).
pub type Call = Vec<Option<usize>>;

/// Dosage of the effect allele for one sample, `None` if missing.
pub type Dosage = Option<f64>;

/// Filter status of a variant record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterStatus {
    /// `PASS` or no filter applied (`.`).
    #[default]
    Pass,
    /// Names of the failed filters.
    Fail(Vec<String>),
}

/// A variant record from the genotype store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreVariant {
    /// 1-based position.
    pub pos: usize,
    /// Reference allele.
    pub reference: String,
    /// Alternative alleles.
    pub alternatives: Vec<String>,
    /// Filter status of the record.
    pub filter: FilterStatus,
    /// Allele calls, one entry per sample in store order.
    pub calls: Vec<Call>,
}

impl StoreVariant {
    /// Whether the record matches the given 1-based position and alleles.
    pub fn matches(&self, pos: usize, reference: &str, alternative: &str) -> bool {
        self.pos == pos && self.reference == reference && self.allele_index(alternative).is_some()
    }

    /// Allele index of `alternative` as used in the genotype calls (1 for the
    /// first alternative allele).
    pub fn allele_index(&self, alternative: &str) -> Option<usize> {
        self.alternatives
            .iter()
            .position(|alt| alt == alternative)
            .map(|idx| idx + 1)
    }

    /// Number of copies of allele `allele` per sample.
    ///
    /// A sample with any unresolved allele call, without a call at all, or
    /// with more than two allele calls is missing.
    pub fn dosages(&self, allele: usize) -> Vec<Dosage> {
        self.calls
            .iter()
            .map(|call| {
                if call.is_empty() || call.len() > 2 {
                    return None;
                }
                call.iter()
                    .try_fold(0.0, |acc, a| a.map(|a| acc + f64::from(u8::from(a == allele))))
            })
            .collect()
    }
}

/// Parse a `GT` value such as `0/1`, `1|1`, `./.`, or `1` into allele calls.
pub fn parse_gt(gt: &str) -> Call {
    gt.split(['/', '|'])
        .map(|allele| allele.parse::<usize>().ok())
        .collect()
}

/// Access to variants and genotypes of a cohort.
pub trait GenotypeStore {
    /// Sample names, in the order used for dosage vectors.
    fn sample_names(&self) -> &[String];

    /// Number of samples.
    fn sample_count(&self) -> usize {
        self.sample_names().len()
    }

    /// All variant records on `contig` that overlap the 1-based, closed
    /// interval `[start, end]`.
    fn fetch(
        &mut self,
        contig: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<StoreVariant>, anyhow::Error>;
}

/// In-memory genotype store for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    /// Sample names.
    pub samples: Vec<String>,
    /// Variants with their canonical contig.
    pub variants: Vec<(String, StoreVariant)>,
}

#[cfg(test)]
impl MemoryStore {
    /// Construct with samples `s1`, `s2`, ... and no variants.
    pub fn with_samples(count: usize) -> Self {
        Self {
            samples: (1..=count).map(|i| format!("s{}", i)).collect(),
            variants: Vec::new(),
        }
    }

    /// Add a passing single-allele variant with the given genotypes.
    pub fn add(mut self, contig: &str, pos: usize, reference: &str, alt: &str, gts: &[&str]) -> Self {
        self.variants.push((
            crate::common::canonicalize(contig),
            StoreVariant {
                pos,
                reference: reference.to_string(),
                alternatives: vec![alt.to_string()],
                filter: FilterStatus::Pass,
                calls: gts.iter().map(|gt| parse_gt(gt)).collect(),
            },
        ));
        self
    }

    /// Set the filter of the last added variant.
    pub fn with_filter(mut self, filter: FilterStatus) -> Self {
        if let Some((_, variant)) = self.variants.last_mut() {
            variant.filter = filter;
        }
        self
    }
}

#[cfg(test)]
impl GenotypeStore for MemoryStore {
    fn sample_names(&self) -> &[String] {
        &self.samples
    }

    fn fetch(
        &mut self,
        contig: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<StoreVariant>, anyhow::Error> {
        let contig = crate::common::canonicalize(contig);
        Ok(self
            .variants
            .iter()
            .filter(|(c, v)| {
                *c == contig && v.pos <= end && v.pos + v.reference.len().max(1) - 1 >= start
            })
            .map(|(_, v)| v.clone())
            .collect())
    }
}

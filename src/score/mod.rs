//! Code implementing the `score` sub command.

pub mod accumulate;
pub mod impute;
pub mod output;
pub mod resolve;
pub mod tally;

use std::time::Instant;

use clap::{command, Parser};
use thousands::Separable;

use crate::{
    common::{io::open_write_maybe_gz, trace_rss_now, worker_version},
    coverage::{AllCovered, Coverage, CoverageRegions},
    genotypes::{vcf::VcfStore, GenotypeStore},
    scoredef::ScoreFileReader,
};

use self::{
    accumulate::compute_scores,
    impute::{LocusImputation, SampleImputation},
    output::{write_scores, LocusReport},
    resolve::{ResolveParams, TracingWarnings},
};

/// Command line arguments for `score` sub command.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Compute polygenic scores for a cohort", long_about = None)]
pub struct Args {
    /// Path to the score definition file.
    pub path_scoredef: String,
    /// Path to the bgzip-compressed and indexed cohort VCF file.
    pub path_genotypes: String,

    /// Path to BED file with well-genotyped regions; all regions if omitted.
    #[arg(long)]
    pub path_coverage: Option<String>,
    /// Imputation for loci that are not covered, filtered, or too often missing.
    #[arg(long, value_enum, default_value_t = LocusImputation::Ps)]
    pub locus_imputation: LocusImputation,
    /// Imputation for single samples without genotype.
    #[arg(long, value_enum, default_value_t = SampleImputation::IntPs)]
    pub sample_imputation: SampleImputation,
    /// Maximal fraction of samples without genotype before the locus is imputed.
    #[arg(long, default_value_t = 0.05)]
    pub max_missing_rate: f64,
    /// Minimal number of genotyped samples for cohort-internal imputation.
    #[arg(long, default_value_t = 100)]
    pub min_internal_samples: usize,
    /// Warn about allele frequency mismatch below this p-value.
    #[arg(long, default_value_t = 0.001)]
    pub af_mismatch_pvalue: f64,

    /// Path to the output file, `-` for stdout.
    #[arg(long, default_value = "-")]
    pub path_output: String,
    /// Optional path to a TSV file with one line per locus.
    #[arg(long)]
    pub path_locus_report: Option<String>,
}

impl From<&Args> for ResolveParams {
    fn from(args: &Args) -> Self {
        Self {
            locus_imputation: args.locus_imputation,
            sample_imputation: args.sample_imputation,
            max_missing_rate: args.max_missing_rate,
            min_internal_samples: args.min_internal_samples,
            af_mismatch_pvalue: args.af_mismatch_pvalue,
        }
    }
}

/// Main entry point for `score` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("prs-scorer {}", worker_version());
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    if !(0.0..=1.0).contains(&args.max_missing_rate) {
        anyhow::bail!(
            "maximal missing rate must be in [0, 1] but was {}",
            args.max_missing_rate
        );
    }
    let params = ResolveParams::from(args);

    tracing::info!("opening score definition...");
    let reader = ScoreFileReader::from_path(&args.path_scoredef)?;
    let meta = reader.meta().clone();
    tracing::info!(
        "... score {:?} on {} with offset {}",
        &meta.name,
        &meta.genome_build,
        meta.offset
    );

    tracing::info!("opening genotypes...");
    let mut store = VcfStore::from_path(&args.path_genotypes)?;
    tracing::info!(
        "... cohort has {} samples",
        store.sample_count().separate_with_commas()
    );

    let coverage: Box<dyn Coverage> = if let Some(path_coverage) = &args.path_coverage {
        tracing::info!("loading coverage regions...");
        Box::new(CoverageRegions::from_bed(std::path::Path::new(path_coverage))?)
    } else {
        Box::new(AllCovered)
    };

    let mut report = args
        .path_locus_report
        .as_ref()
        .map(LocusReport::from_path)
        .transpose()?;

    trace_rss_now();

    tracing::info!("computing scores...");
    let before_scoring = Instant::now();
    let scores = compute_scores(
        meta.offset,
        reader.entries(),
        &mut store,
        coverage.as_ref(),
        &params,
        &mut TracingWarnings,
        |entry, resolved| match report.as_mut() {
            Some(report) => report.write(entry, resolved),
            None => Ok(()),
        },
    )?;
    tracing::info!(
        "... done scoring {} loci in {:?}",
        scores.loci.separate_with_commas(),
        before_scoring.elapsed()
    );
    for (outcome, count) in &scores.outcomes {
        tracing::info!("  {:>16}: {}", outcome.to_string(), count.separate_with_commas());
    }

    if let Some(report) = report {
        report.finish()?;
    }

    let writer = open_write_maybe_gz(&args.path_output)
        .map_err(|e| anyhow::anyhow!("could not open output {}: {}", &args.path_output, e))?;
    write_scores(writer, store.sample_names(), &scores.values)?;

    trace_rss_now();
    tracing::info!(
        "All of `score` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

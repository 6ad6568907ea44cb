//! Code implementing the `index` sub command.

use std::time::Instant;

use clap::{command, Parser};
use thousands::Separable;

use crate::common::noodles::build_tbi;

/// Command line arguments for `index` sub command.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Build tabix index for cohort VCF", long_about = None)]
pub struct Args {
    /// Path to the bgzip-compressed VCF file.
    pub path_genotypes: String,
    /// Path to the index to write; defaults to the input path with `.tbi`.
    #[arg(long)]
    pub path_index: Option<String>,
}

/// Main entry point for `index` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let path_index = args
        .path_index
        .clone()
        .unwrap_or_else(|| format!("{}.tbi", &args.path_genotypes));
    tracing::info!("writing index to {}...", &path_index);
    let count = build_tbi(&args.path_genotypes, &path_index)?;
    tracing::info!(
        "... indexed {} records in {:?}",
        count.separate_with_commas(),
        before_anything.elapsed()
    );

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::genotypes::{vcf::VcfStore, GenotypeStore};

    const VCF: &str = "##fileformat=VCFv4.3\n\
        ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
        ##contig=<ID=1,length=1000>\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tx\n\
        1\t100\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\n";

    #[test]
    fn default_index_path() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path = tmpdir.join("cohort.vcf.gz");
        crate::common::noodles::write_bgzf(&path, VCF)?;
        let args = super::Args {
            path_genotypes: path.to_string_lossy().to_string(),
            path_index: None,
        };

        super::run(&crate::common::Args::default(), &args)?;

        assert!(tmpdir.join("cohort.vcf.gz.tbi").exists());
        let mut store = VcfStore::from_path(&path)?;
        assert_eq!(store.fetch("1", 100, 100)?.len(), 1);

        Ok(())
    }

    #[test]
    fn explicit_index_path() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path = tmpdir.join("cohort.vcf.gz");
        crate::common::noodles::write_bgzf(&path, VCF)?;
        let args = super::Args {
            path_genotypes: path.to_string_lossy().to_string(),
            path_index: Some(tmpdir.join("other.tbi").to_string_lossy().to_string()),
        };

        super::run(&crate::common::Args::default(), &args)?;

        assert!(tmpdir.join("other.tbi").exists());
        assert!(!tmpdir.join("cohort.vcf.gz.tbi").exists());

        Ok(())
    }
}

//! Genotype store backed by an indexed, bgzip-compressed VCF file.

use std::path::Path;

use indexmap::IndexMap;
use noodles_core::{Position, Region};
use noodles_vcf as vcf;

use super::{parse_gt, FilterStatus, GenotypeStore, StoreVariant};
use crate::common::{build_contig_map, canonicalize};

/// Genotype store reading from a VCF file with `.tbi` or `.csi` index.
pub struct VcfStore {
    /// The indexed reader.
    reader: vcf::IndexedReader<std::fs::File>,
    /// Header of the VCF file.
    header: vcf::Header,
    /// Sample names from the header.
    samples: Vec<String>,
    /// Map from canonical contig name to the name in the file.
    contig_map: IndexMap<String, String>,
}

impl std::fmt::Debug for VcfStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcfStore")
            .field("samples", &self.samples.len())
            .field("contigs", &self.contig_map.len())
            .finish()
    }
}

impl VcfStore {
    /// Open the VCF file at `path`; the index must be next to it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let mut reader = vcf::indexed_reader::Builder::default()
            .build_from_path(path)
            .map_err(|e| {
                anyhow::anyhow!(
                    "could not open indexed VCF {:?} (is it bgzip-compressed with .tbi/.csi index?): {}",
                    path,
                    e
                )
            })?;
        let header = reader
            .read_header()
            .map_err(|e| anyhow::anyhow!("problem reading VCF header of {:?}: {}", path, e))?;

        let samples = header.sample_names().iter().cloned().collect::<Vec<_>>();
        let contig_map = build_contig_map(header.contigs().keys().map(|name| name.to_string()));
        tracing::debug!(
            "opened {:?} with {} samples and {} contigs",
            path,
            samples.len(),
            contig_map.len()
        );

        Ok(Self {
            reader,
            header,
            samples,
            contig_map,
        })
    }

    /// Contig name as spelled in the VCF file, if known.
    fn resolve_contig(&self, contig: &str) -> Option<String> {
        if self.contig_map.is_empty() {
            // no contig lines in header, trust the caller
            Some(contig.to_string())
        } else {
            self.contig_map.get(&canonicalize(contig)).cloned()
        }
    }
}

/// Convert a noodles VCF record into a `StoreVariant`.
fn to_store_variant(record: &vcf::Record) -> StoreVariant {
    let filter = match record.filters() {
        Some(vcf::record::Filters::Fail(ids)) => FilterStatus::Fail(ids.iter().cloned().collect()),
        Some(vcf::record::Filters::Pass) | None => FilterStatus::Pass,
    };

    let calls = record
        .genotypes()
        .values()
        .map(
            |sample| match sample.get(&vcf::record::genotypes::keys::key::GENOTYPE) {
                Some(Some(vcf::record::genotypes::sample::Value::String(gt))) => parse_gt(gt),
                _ => Vec::new(),
            },
        )
        .collect();

    StoreVariant {
        pos: usize::from(record.position()),
        reference: record.reference_bases().to_string(),
        alternatives: record
            .alternate_bases()
            .iter()
            .map(|allele| allele.to_string())
            .collect(),
        filter,
        calls,
    }
}

impl GenotypeStore for VcfStore {
    fn sample_names(&self) -> &[String] {
        &self.samples
    }

    fn fetch(
        &mut self,
        contig: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<StoreVariant>, anyhow::Error> {
        let Some(name) = self.resolve_contig(contig) else {
            tracing::trace!("contig {} not in VCF header", contig);
            return Ok(Vec::new());
        };
        // The index only lists contigs with records, querying others fails.
        let in_index = self
            .reader
            .index()
            .header()
            .map(|header| header.reference_sequence_names().contains(name.as_str()))
            .unwrap_or(true);
        if !in_index {
            tracing::trace!("contig {} has no records in VCF", &name);
            return Ok(Vec::new());
        }
        let start = Position::try_from(start.max(1))
            .map_err(|e| anyhow::anyhow!("invalid start position {}: {}", start, e))?;
        let end = Position::try_from(end.max(1))
            .map_err(|e| anyhow::anyhow!("invalid end position {}: {}", end, e))?;
        let region = Region::new(name, start..=end);

        let query = self
            .reader
            .query(&self.header, &region)
            .map_err(|e| anyhow::anyhow!("problem querying VCF for {}: {}", &region, e))?;

        let mut result = Vec::new();
        for record in query {
            let record = record
                .map_err(|e| anyhow::anyhow!("problem reading VCF record in {}: {}", &region, e))?;
            result.push(to_store_variant(&record));
        }
        Ok(result)
    }
}

//! Writing of scores and of the per-locus report.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use csv::QuoteStyle;

use crate::{common::io::open_write_maybe_gz, scoredef::ScoreEntry};

use super::resolve::{Outcome, ResolvedLocus};

/// Format a score; missing scores become `nan`.
pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) if !value.is_nan() => format!("{:?}", value),
        _ => String::from("nan"),
    }
}

/// Write one `sample<TAB>score` line per sample.
pub fn write_scores<W: Write>(
    writer: W,
    samples: &[String],
    scores: &[Option<f64>],
) -> Result<(), anyhow::Error> {
    if samples.len() != scores.len() {
        anyhow::bail!(
            "have {} samples but {} scores",
            samples.len(),
            scores.len()
        );
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);
    for (sample, score) in samples.iter().zip(scores.iter()) {
        writer
            .write_record([sample.as_str(), format_score(*score).as_str()])
            .map_err(|e| anyhow::anyhow!("problem writing score of {}: {}", sample, e))?;
    }
    writer
        .flush()
        .map_err(|e| anyhow::anyhow!("problem flushing scores: {}", e))?;

    Ok(())
}

/// One line of the locus report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LocusRecord {
    pub contig: String,
    pub pos: usize,
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(rename = "alt")]
    pub alternative: String,
    pub beta: f64,
    pub aaf: f64,
    pub outcome: Outcome,
    pub n_genotyped: Option<usize>,
    pub n_missing: Option<usize>,
    pub observed_aaf: Option<f64>,
    pub af_pvalue: Option<f64>,
}

impl LocusRecord {
    pub fn new(entry: &ScoreEntry, resolved: &ResolvedLocus) -> Self {
        Self {
            contig: entry.contig.clone(),
            pos: entry.pos,
            reference: entry.reference.clone(),
            alternative: entry.alternative.clone(),
            beta: entry.beta,
            aaf: entry.aaf,
            outcome: resolved.outcome,
            n_genotyped: resolved.tally.map(|tally| tally.genotyped),
            n_missing: resolved.tally.map(|tally| tally.missing),
            observed_aaf: resolved.tally.and_then(|tally| tally.observed_aaf()),
            af_pvalue: resolved.pvalue,
        }
    }
}

/// Writer for the TSV locus report.
///
/// When created with `from_path`, lines go to a hidden partial file next to
/// the target that is only renamed by `finish()`; a report that is dropped
/// unfinished is removed.
pub struct LocusReport {
    writer: Option<csv::Writer<Box<dyn Write>>>,
    /// Paths of the partial file and of the final report.
    paths: Option<(PathBuf, PathBuf)>,
}

impl LocusReport {
    /// Create report at `path`, gzip compressed if it ends in `.gz`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("invalid locus report path {:?}", path))?;
        let path_partial =
            path.with_file_name(format!(".partial.{}", file_name.to_string_lossy()));
        let inner = open_write_maybe_gz(&path_partial)
            .map_err(|e| anyhow::anyhow!("could not create locus report {:?}: {}", path, e))?;

        let mut result = Self::from_writer(inner);
        result.paths = Some((path_partial, path.to_path_buf()));
        Ok(result)
    }

    /// Construct around an arbitrary writer.
    pub fn from_writer(inner: Box<dyn Write>) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(true)
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .from_writer(inner);
        Self {
            writer: Some(writer),
            paths: None,
        }
    }

    /// Append the line for one locus.
    pub fn write(&mut self, entry: &ScoreEntry, resolved: &ResolvedLocus) -> Result<(), anyhow::Error> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("locus report already finished"))?;
        writer
            .serialize(LocusRecord::new(entry, resolved))
            .map_err(|e| anyhow::anyhow!("problem writing locus report for {}: {}", entry, e))
    }

    /// Flush all buffered lines and move the report into place.
    pub fn finish(mut self) -> Result<(), anyhow::Error> {
        if let Some(writer) = self.writer.take() {
            let inner = writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("problem flushing locus report: {}", e))?;
            // closes the file, gzip output writes its trailer here
            drop(inner);
        }
        if let Some((path_partial, path)) = self.paths.take() {
            std::fs::rename(&path_partial, &path).map_err(|e| {
                anyhow::anyhow!("could not move locus report to {:?}: {}", &path, e)
            })?;
        }
        Ok(())
    }
}

impl Drop for LocusReport {
    fn drop(&mut self) {
        self.writer.take();
        if let Some((path_partial, _)) = self.paths.take() {
            if let Err(e) = std::fs::remove_file(&path_partial) {
                tracing::debug!("could not remove {:?}: {}", &path_partial, e);
            }
        }
    }
}

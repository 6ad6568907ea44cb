//! Reading of score definition files.
//!
//! A score definition starts with five free-text header lines (name,
//! description, citation, genome build, offset) that are followed by
//! tab-separated records with the columns `contig`, `pos`, `ref`, `alt`,
//! `beta`, and `aaf`.

use std::{io::BufRead, path::Path};

use crate::{common::io::open_read_maybe_gz, err::ScoreFileError};

/// Number of header lines before the records start.
const HEADER_LINES: usize = 5;

/// Metadata from the score definition header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreFileMeta {
    /// Name of the score.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Citation of the publication.
    pub citation: String,
    /// Genome build that coordinates refer to.
    pub genome_build: String,
    /// Offset added once to each final score.
    pub offset: f64,
}

/// One scored locus.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEntry {
    /// Contig name as given in the score file.
    pub contig: String,
    /// 1-based position.
    pub pos: usize,
    /// Reference allele.
    pub reference: String,
    /// Alternative allele, the effect allele.
    pub alternative: String,
    /// Effect size.
    pub beta: f64,
    /// Population frequency of the effect allele.
    pub aaf: f64,
}

impl ScoreEntry {
    /// Last position covered by the reference allele (1-based, inclusive).
    pub fn end(&self) -> usize {
        self.pos.saturating_add(self.reference.len().max(1) - 1)
    }

    /// Parse from the fields of one record; `line` is used for error messages.
    pub fn from_record(record: &csv::StringRecord, line: usize) -> Result<Self, ScoreFileError> {
        if record.len() != 6 {
            return Err(ScoreFileError::FieldCount {
                line,
                found: record.len(),
            });
        }

        let text = |idx: usize, field: &'static str| -> Result<String, ScoreFileError> {
            let value = record[idx].trim();
            if value.is_empty() {
                Err(ScoreFileError::EmptyField { line, field })
            } else {
                Ok(value.to_string())
            }
        };
        let number = |idx: usize, field: &'static str| -> Result<f64, ScoreFileError> {
            let value = record[idx].trim();
            value
                .parse::<f64>()
                .map_err(|source| ScoreFileError::InvalidNumber {
                    line,
                    field,
                    value: value.to_string(),
                    source,
                })
        };

        let contig = text(0, "contig")?;
        let pos = record[1]
            .trim()
            .parse::<usize>()
            .map_err(|source| ScoreFileError::InvalidPosition {
                line,
                value: record[1].to_string(),
                source,
            })?;
        if pos == 0 {
            return Err(ScoreFileError::OutOfRange {
                line,
                field: "position",
                value: 0.0,
            });
        }
        let reference = text(2, "reference allele")?;
        if pos.checked_add(reference.len()).is_none() {
            return Err(ScoreFileError::OutOfRange {
                line,
                field: "position",
                value: pos as f64,
            });
        }
        let alternative = text(3, "alternative allele")?;
        let beta = number(4, "beta")?;
        if !beta.is_finite() {
            return Err(ScoreFileError::OutOfRange {
                line,
                field: "beta",
                value: beta,
            });
        }
        let aaf = number(5, "allele frequency")?;
        if !(0.0..=1.0).contains(&aaf) {
            return Err(ScoreFileError::OutOfRange {
                line,
                field: "allele frequency",
                value: aaf,
            });
        }

        Ok(Self {
            contig,
            pos,
            reference,
            alternative,
            beta,
            aaf,
        })
    }
}

impl std::fmt::Display for ScoreEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.contig, self.pos, self.reference, self.alternative
        )
    }
}

/// Reader for score definition files.
///
/// The header is read eagerly on construction, the records are only parsed
/// when iterating with `entries()`.
pub struct ScoreFileReader<R: BufRead> {
    /// Metadata from the header.
    meta: ScoreFileMeta,
    /// The CSV reader for the record section.
    reader: csv::Reader<R>,
}

impl ScoreFileReader<Box<dyn BufRead>> {
    /// Open the file at `path`, optionally gzip compressed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let reader = open_read_maybe_gz(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("could not open score file {:?}: {}", path.as_ref(), e)
        })?;
        Self::from_reader(reader)
    }
}

impl<R: BufRead> ScoreFileReader<R> {
    /// Construct from a reader positioned at the start of the file.
    pub fn from_reader(mut reader: R) -> Result<Self, anyhow::Error> {
        const FIELDS: [&str; HEADER_LINES] =
            ["name", "description", "citation", "genome build", "offset"];

        let mut values = Vec::with_capacity(HEADER_LINES);
        for (idx, field) in FIELDS.iter().enumerate() {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(ScoreFileError::TruncatedHeader {
                    line: idx + 1,
                    field,
                }
                .into());
            }
            values.push(line.trim_end_matches(['\n', '\r']).to_string());
        }

        let offset_str = values[4].trim();
        let offset =
            offset_str
                .parse::<f64>()
                .map_err(|source| ScoreFileError::InvalidOffset {
                    value: offset_str.to_string(),
                    source,
                })?;
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        let meta = ScoreFileMeta {
            name: next(),
            description: next(),
            citation: next(),
            genome_build: next(),
            offset,
        };

        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { meta, reader })
    }

    /// Metadata from the header.
    pub fn meta(&self) -> &ScoreFileMeta {
        &self.meta
    }

    /// Consume the reader and return an iterator over the entries.
    pub fn entries(self) -> ScoreEntries<R> {
        ScoreEntries {
            records: self.reader.into_records(),
        }
    }
}

/// Lazy iterator over the entries of a score file.
pub struct ScoreEntries<R: BufRead> {
    records: csv::StringRecordsIntoIter<R>,
}

impl<R: BufRead> Iterator for ScoreEntries<R> {
    type Item = Result<ScoreEntry, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(anyhow::anyhow!("problem reading score file: {}", e))),
        };
        let line = record
            .position()
            .map(|pos| pos.line() as usize + HEADER_LINES)
            .unwrap_or_default();
        Some(ScoreEntry::from_record(&record, line).map_err(anyhow::Error::from))
    }
}

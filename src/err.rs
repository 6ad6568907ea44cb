//! Error types for fatal conditions.

use std::num::{ParseFloatError, ParseIntError};

/// Problems with the score definition file.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScoreFileError {
    #[error("score file ends before header line {line} ({field})")]
    TruncatedHeader { line: usize, field: &'static str },
    #[error("invalid offset {value:?} in header line 5: {source}")]
    InvalidOffset {
        value: String,
        source: ParseFloatError,
    },
    #[error("line {line}: expected 6 tab-separated fields but found {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: invalid position {value:?}: {source}")]
    InvalidPosition {
        line: usize,
        value: String,
        source: ParseIntError,
    },
    #[error("line {line}: invalid {field} {value:?}: {source}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
        source: ParseFloatError,
    },
    #[error("line {line}: {field} {value} out of range")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: f64,
    },
    #[error("line {line}: empty {field}")]
    EmptyField { line: usize, field: &'static str },
}

/// Problems during scoring that abort the run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("score definition contains no loci")]
    NoLoci,
    #[error("locus {locus} yielded {found} dosages for {expected} samples")]
    SampleCountMismatch {
        locus: String,
        expected: usize,
        found: usize,
    },
}

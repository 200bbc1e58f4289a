use std::num::ParseIntError;
use std::path::PathBuf;

/// Failures while reading or decoding a mountstats stream.
///
/// Every structural variant carries the 1-based line number so a caller can
/// point at the offending input.
#[derive(Debug, thiserror::Error)]
pub enum MountstatsError {
    #[error("failed to open mountstats file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognised device line at line {line}: `{text}`")]
    InvalidDeviceLine { line: usize, text: String },

    #[error("operation line without a name at line {line}: `{text}`")]
    MissingOperationName { line: usize, text: String },

    #[error("`{section}` at line {line} has {found} fields, expected at least {expected}")]
    TooFewFields {
        section: String,
        expected: usize,
        found: usize,
        line: usize,
    },

    #[error("invalid value for `{field}` at line {line}: '{value}': {source}")]
    InvalidField {
        field: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },
}

impl MountstatsError {
    /// Line the error refers to, if it came from the stream contents.
    pub fn line(&self) -> Option<usize> {
        match self {
            MountstatsError::Open { .. } => None,
            MountstatsError::Read { line, .. }
            | MountstatsError::InvalidDeviceLine { line, .. }
            | MountstatsError::MissingOperationName { line, .. }
            | MountstatsError::TooFewFields { line, .. }
            | MountstatsError::InvalidField { line, .. } => Some(*line),
        }
    }
}

pub type Result<T> = std::result::Result<T, MountstatsError>;

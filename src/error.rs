use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ItemId;

/// Per-record failures. The offending record is skipped, the run goes on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("name `{0}` does not carry a `(year)` suffix")]
    MalformedName(String),
    #[error("label field `{0}` has no usable labels")]
    NoLabels(String),
    #[error("no rating observed for item {0}")]
    MissingScore(ItemId),
    #[error("malformed rating row: {0}")]
    MalformedRating(String),
}

impl RecordError {
    /// Short name of the failure kind, used in skip statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::MalformedRecord(_) => "malformed_record",
            RecordError::MalformedName(_) => "malformed_name",
            RecordError::NoLabels(_) => "no_labels",
            RecordError::MissingScore(_) => "missing_score",
            RecordError::MalformedRating(_) => "malformed_rating",
        }
    }
}

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("source `{}` is unreadable: {source}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("`{text}` cannot be written as {encoding}")]
    Unencodable {
        encoding: &'static str,
        text: String,
    },
}

impl RankError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        RankError::Config(msg.into())
    }

    pub(crate) fn source_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RankError::SourceIo {
            path: path.into(),
            source,
        }
    }
}

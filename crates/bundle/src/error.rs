use datamarket_types::DataFrequency;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("bundle value columns differ: existing {existing:?}, incoming {incoming:?}")]
    SchemaMismatch {
        existing: Vec<String>,
        incoming: Vec<String>,
    },

    #[error("invalid bundle schema in {path}: {reason}")]
    InvalidSchema { path: PathBuf, reason: String },

    #[error("bundle {path} does not record its frequency")]
    MissingFrequency { path: PathBuf },

    #[error("bundle frequency {found} does not match {expected}")]
    FrequencyMismatch {
        expected: DataFrequency,
        found: DataFrequency,
    },

    #[error("row has {found} values, bundle has {expected} value columns")]
    RowWidth { expected: usize, found: usize },

    #[error("dataset name {0:?} cannot be used as a directory name")]
    InvalidDatasetName(String),

    #[error("bundle directory {0} has contents but no bundle file")]
    UnexpectedContents(PathBuf),
}

//! Error types for the labeling pipeline

use thiserror::Error;

/// Errors that can occur in the labeling pipeline
#[derive(Error, Debug)]
pub enum LabelerError {
    /// Source export files are missing or unreadable. Fatal for the run.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A registered table is missing an expected column. Fatal for the run.
    #[error("schema mismatch in table {table}: missing column {column}")]
    SchemaMismatch { table: String, column: String },

    /// Query execution error from the columnar engine. Fatal for the run.
    #[error("query error: {0}")]
    Query(#[from] datafusion::error::DataFusionError),

    /// Arrow-level decoding error. Fatal for the run.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A required source field is absent for one record. The record is
    /// excluded from the tag stream, never submitted partially.
    #[error("missing field {field} for contract {address}")]
    MissingField {
        field: &'static str,
        address: String,
    },

    /// Source language is outside the platform vocabulary. Excludes the
    /// record, same handling as a missing field.
    #[error("unsupported language {language} for contract {address}")]
    UnsupportedLanguage { language: String, address: String },

    /// A label failed pre-submission validation. Yields a Skipped result.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote platform rejected or failed a submission. Yields a
    /// Failed result, the batch continues.
    #[error("submission failed: {0}")]
    Submission(String),

    /// HTTP transport error on the off-chain path
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid startup parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Checkpoint file could not be written or removed
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl LabelerError {
    /// Per-record errors that exclude one record from the tag stream
    /// without aborting the run.
    pub fn is_exclusion(&self) -> bool {
        matches!(
            self,
            LabelerError::MissingField { .. } | LabelerError::UnsupportedLanguage { .. }
        )
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, LabelerError>;
